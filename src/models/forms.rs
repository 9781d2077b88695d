use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct BucketForm {
    pub bucket_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryForm {
    pub directory_path: String,
}
