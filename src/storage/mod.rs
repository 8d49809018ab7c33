pub mod gateway;
pub mod object_store;

pub use gateway::Gateway;
pub use object_store::{InMemoryObjectStore, ObjectStore, S3ObjectStore};
