//! List download and decompression

use super::RemoteMetadata;
use crate::config::FilmlistConfig;
use crate::error::{Error, Result};
use crate::progress::{finish_progress, start_byte_bar};
use reqwest::Client;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Magic bytes opening every xz stream
const XZ_MAGIC: [u8; 6] = [0xFD, b'7', b'z', b'X', b'Z', 0x00];

/// A list file on disk, as downloaded
#[derive(Debug, Clone)]
pub struct Download {
    pub path: PathBuf,
    pub bytes: u64,
    pub metadata: RemoteMetadata,
}

/// Streams remote lists into a work directory
pub struct Fetcher {
    client: Client,
    work_dir: PathBuf,
    show_progress: bool,
}

impl Fetcher {
    pub fn new(config: &FilmlistConfig, work_dir: impl Into<PathBuf>) -> Result<Self> {
        // No overall timeout: full lists take minutes on slow links.
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            work_dir: work_dir.into(),
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Download `url` to `<work_dir>/<file_name>`.
    ///
    /// Data goes to a `.part` file first, which is renamed once complete,
    /// so an interrupted download never leaves a truncated list behind.
    pub async fn download(
        &self,
        url: &str,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Download> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let target = self.work_dir.join(file_name);
        let partial = self.work_dir.join(format!("{}.part", file_name));

        info!(url, "Downloading list");
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let metadata = RemoteMetadata::from_headers(url, response.headers());

        let bar = self
            .show_progress
            .then(|| start_byte_bar(metadata.content_length, file_name));

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut bytes = 0u64;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = response.chunk() => Some(chunk?),
            };
            let Some(chunk) = chunk else {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(Error::Download("download cancelled".to_string()));
            };
            let Some(chunk) = chunk else {
                break;
            };
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
            if let Some(bar) = &bar {
                bar.set_position(bytes);
            }
        }
        file.flush().await?;
        drop(file);

        if let Some(expected) = metadata.content_length {
            if expected != bytes {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(Error::Download(format!(
                    "incomplete download: {} of {} bytes",
                    bytes, expected
                )));
            }
        }

        tokio::fs::rename(&partial, &target).await?;
        if let Some(bar) = bar {
            finish_progress(bar, "downloaded");
        }
        debug!(path = %target.display(), bytes, "Download complete");

        Ok(Download {
            path: target,
            bytes,
            metadata,
        })
    }
}

/// Turns a downloaded list into plain JSON
pub trait Decompressor: Send + Sync {
    /// Return the path of the plain JSON list, writing it into `work_dir`
    /// when `path` needs decoding.
    fn decompress(&self, path: &Path, work_dir: &Path) -> Result<PathBuf>;
}

/// Detects xz input by its magic bytes and passes anything else through
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecompressor;

impl AutoDecompressor {
    fn is_xz(path: &Path) -> Result<bool> {
        let mut magic = [0u8; XZ_MAGIC.len()];
        let mut file = File::open(path)?;
        let mut read = 0;
        while read < magic.len() {
            match file.read(&mut magic[read..])? {
                0 => break,
                n => read += n,
            }
        }
        Ok(read == magic.len() && magic == XZ_MAGIC)
    }
}

impl Decompressor for AutoDecompressor {
    fn decompress(&self, path: &Path, work_dir: &Path) -> Result<PathBuf> {
        if !Self::is_xz(path)? {
            debug!(path = %path.display(), "List is not compressed");
            return Ok(path.to_path_buf());
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("list");
        let output = work_dir.join(format!("{}.json", stem));
        std::fs::create_dir_all(work_dir)?;
        decompress_xz(path, &output)?;
        Ok(output)
    }
}

#[cfg(feature = "xz")]
fn decompress_xz(input: &Path, output: &Path) -> Result<()> {
    use std::io::BufReader;

    info!(path = %input.display(), "Decompressing list");
    let reader = xz2::read::XzDecoder::new(BufReader::new(File::open(input)?));
    let mut reader = BufReader::new(reader);
    let mut writer = std::io::BufWriter::new(File::create(output)?);
    let written = std::io::copy(&mut reader, &mut writer).map_err(|e| {
        let _ = std::fs::remove_file(output);
        Error::Decompress(format!("{}: {}", input.display(), e))
    })?;
    std::io::Write::flush(&mut writer)?;
    debug!(bytes = written, "Decompressed list");
    Ok(())
}

#[cfg(not(feature = "xz"))]
fn decompress_xz(input: &Path, _output: &Path) -> Result<()> {
    Err(Error::Decompress(format!(
        "{} is xz-compressed but xz support is not enabled",
        input.display()
    )))
}
