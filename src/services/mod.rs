mod gcs;
mod memory;
pub mod storage;
mod task_registry;

pub use gcs::GcsStorage;
pub use memory::InMemoryStorage;
pub use storage::ObjectStorage;
pub use task_registry::TaskRegistry;
