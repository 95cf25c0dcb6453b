//! Object storage.
//!
//! Pipeline output is written as opaque objects into a single container.
//! [`ObjectStore`] is the backend seam; [`StoreGateway`] binds a store to the
//! configured container and creates the container on first use.

mod error;
mod fs_store;
mod gateway;
pub mod keys;
mod traits;

pub use error::StorageError;
pub use fs_store::FsObjectStore;
pub use gateway::StoreGateway;
pub use traits::{ObjectInfo, ObjectStore};
