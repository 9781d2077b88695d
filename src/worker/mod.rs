mod uploader;
pub mod walker;

pub use uploader::UploadEngine;
