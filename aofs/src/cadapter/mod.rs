//! Object store adapter (cAdapter)
//!
//! Submodules:
//! - `client`: the `ObjectBackend` contract and the shared `ObjectClient` handle
//! - `localfs`: objects as files under a local directory
//! - `memory`: objects in a map, for tests
//! - `s3`: S3-compatible adapter implementation
//!
//! Every backend stores whole objects only: a download writes the full object
//! into a local sink and an upload replaces the full object. Retries, if any,
//! belong to the backend.
pub mod client;
pub mod localfs;
pub mod memory;
pub mod s3;
