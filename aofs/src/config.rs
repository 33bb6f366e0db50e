use std::path::PathBuf;

pub const DEFAULT_SCRATCH_PREFIX: &str = "aofs-";

/// Options shared by every file a file system opens.
#[derive(Clone, Debug)]
pub struct FsOptions {
    /// Bucket (namespace) every opened name lives in.
    pub bucket: String,
    /// Where cache files are created. `None` means the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
    pub scratch_prefix: String,
}

impl FsOptions {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            scratch_dir: None,
            scratch_prefix: DEFAULT_SCRATCH_PREFIX.to_string(),
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_scratch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scratch_prefix = prefix.into();
        self
    }
}
