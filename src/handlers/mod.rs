mod buckets;
mod files;
mod pages;
mod tasks;

pub use buckets::{select_active_bucket, set_active_bucket, create_bucket, list_buckets, delete_bucket};
pub use files::{upload_file, retrieve_files, download_file};
pub use pages::{
    serve_index, serve_create_bucket_form, serve_delete_bucket_form,
    serve_upload_form, serve_upload_directory_form,
};
pub use tasks::{upload_directory, get_task_status, list_tasks};
