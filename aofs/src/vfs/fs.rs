//! The file layer's public surface: `FileSystem` opens, `File` writes,
//! flushes and closes.
//!
//! Callers depend only on these two traits, so the backing store can change
//! without touching calling code.

use crate::error::Result;
use async_trait::async_trait;

/// An open, append-only handle on a logical object.
///
/// Operations take `&mut self`: a handle is driven by one task at a time and
/// callers serialize access themselves. Different handles are independent.
#[async_trait]
pub trait File: Send {
    /// Append `buf` at the cursor and return how many bytes were taken. Never
    /// touches the network.
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Make everything written so far durable in the backing store. A flush
    /// with nothing new to send succeeds without a network call.
    async fn flush(&mut self) -> Result<()>;

    /// Flush one last time and release local resources. Every step runs even if
    /// an earlier one failed; all failures are returned together.
    async fn close(&mut self) -> Result<()>;

    async fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf).await?;
            if n == 0 {
                return Err(crate::error::Error::Write(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                )));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    type File: File;

    /// Open `name` for appending. Existing content is loaded first; a name
    /// that does not exist yet opens as an empty file.
    async fn open(&self, name: &str) -> Result<Self::File>;
}
