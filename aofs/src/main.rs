use std::path::PathBuf;

use anyhow::Context;
use aofs::cadapter::s3::S3Config;
use aofs::vfs::sdk::{LocalFileSystem, S3FileSystem};
use aofs::{File, FileSystem, FsOptions, ObjectBackend, ObjectFileSystem};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aofs", version)]
#[command(about = "Append-style files over object stores", long_about = None)]
struct Cli {
    /// Object store backend
    #[arg(long, env = "AOFS_BACKEND", value_enum, default_value_t = Backend::Local)]
    backend: Backend,

    /// Root directory of the local backend
    #[arg(long, env = "AOFS_ROOT", default_value = "/var/lib/aofs")]
    root: PathBuf,

    /// Bucket holding the objects
    #[arg(short, long, env = "AOFS_BUCKET", default_value = "main")]
    bucket: String,

    /// Directory for local cache files (defaults to the OS temp dir)
    #[arg(long, env = "AOFS_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// S3 endpoint, for S3-compatible services
    #[arg(long, env = "AOFS_S3_ENDPOINT")]
    endpoint: Option<String>,

    /// S3 region
    #[arg(long, env = "AOFS_S3_REGION", default_value = "us-east-1")]
    region: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Local,
    S3,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Append lines from stdin to an object")]
    Append {
        #[arg(value_name = "KEY")]
        key: String,
        /// Flush after every N lines; 0 flushes only on close
        #[arg(long, default_value_t = 0)]
        flush_every: usize,
    },
    #[command(about = "Print an object to stdout")]
    Cat {
        #[arg(value_name = "KEY")]
        key: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut options = FsOptions::new(cli.bucket.clone());
    if let Some(dir) = &cli.scratch_dir {
        options = options.with_scratch_dir(dir);
    }

    match cli.backend {
        Backend::Local => {
            let fs = LocalFileSystem::new_local(&cli.root, options);
            run(&fs, cli.command).await
        }
        Backend::S3 => {
            let config = S3Config {
                endpoint: cli.endpoint.clone(),
                region: cli.region.clone(),
                force_path_style: cli.endpoint.is_some(),
                ..S3Config::default()
            };
            let fs = S3FileSystem::new_s3(config, options).await;
            run(&fs, cli.command).await
        }
    }
}

async fn run<B: ObjectBackend + 'static>(
    fs: &ObjectFileSystem<B>,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Append { key, flush_every } => append(fs, &key, flush_every).await,
        Commands::Cat { key } => cat(fs, &key).await,
    }
}

async fn append<B: ObjectBackend + 'static>(
    fs: &ObjectFileSystem<B>,
    key: &str,
    flush_every: usize,
) -> anyhow::Result<()> {
    let mut file = fs
        .open(key)
        .await
        .with_context(|| format!("failed to open {}/{key}", fs.bucket()))?;

    // Close even when copying failed, so the cache file is always released.
    let copied = copy_lines(&mut file, flush_every).await;
    let closed = file
        .close()
        .await
        .with_context(|| format!("failed to close {}/{key}", fs.bucket()));
    let lines = copied?;
    closed?;

    tracing::info!("appended {lines} lines to {}/{key}", fs.bucket());
    Ok(())
}

async fn copy_lines<F: File>(file: &mut F, flush_every: usize) -> anyhow::Result<usize> {
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut count = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        count += 1;
        if flush_every > 0 && count % flush_every == 0 {
            file.flush().await?;
        }
    }
    Ok(count)
}

async fn cat<B: ObjectBackend>(fs: &ObjectFileSystem<B>, key: &str) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    match fs.client().get_object(fs.bucket(), key, &mut stdout).await {
        Ok(n) => {
            tracing::debug!("read {n} bytes from {}/{key}", fs.bucket());
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            tracing::info!("{}/{key} does not exist", fs.bucket());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("failed to read {}/{key}", fs.bucket())),
    }
}
