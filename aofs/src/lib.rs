// Library crate for aofs: append-style files over whole-object stores.

pub mod cadapter;
pub mod config;
pub mod error;
pub mod vfs;

pub use cadapter::client::{ObjectBackend, ObjectClient, StoreError};
pub use config::FsOptions;
pub use error::{Error, Errors, Result};
pub use vfs::fs::{File, FileSystem};
pub use vfs::object::{ObjectFile, ObjectFileSystem};
