//! VFS layer (virtual filesystem)
//!
//! Responsibilities:
//! - Expose append-style files (`write` / `flush` / `close`) over stores that
//!   only know whole-object uploads and downloads.
//! - Own the local cache file behind every open file and make sure it is
//!   released on close, even when the final upload fails.
//!
//! Submodules:
//! - `fs`: the `FileSystem` / `File` capability traits
//! - `cache`: scratch file allocation and the cache file itself
//! - `object`: files backed by an `ObjectBackend`
//! - `sdk`: convenience constructors for the local and S3 stacks
pub mod cache;
pub mod fs;
pub mod object;
pub mod sdk;
