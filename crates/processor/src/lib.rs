//! Delivery processing: safe path resolution and serialized pulls

pub mod controller;
pub mod error;
pub mod locks;
pub mod path;
pub mod puller;

pub use controller::RepositorySyncController;
pub use error::{PathError, ProcessError, SyncError};
pub use locks::RepoLocks;
pub use path::{resolve_path, ResolvedPath};
pub use puller::{GitPuller, Puller};
