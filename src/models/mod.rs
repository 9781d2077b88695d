mod forms;
mod task;

pub use forms::{BucketForm, DirectoryForm};
pub use task::{FileOutcome, FileStatus, Task, TaskStatus};
