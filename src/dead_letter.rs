//! Saves staged payloads that could not be parsed to
//! `{dir}/{timestamp}_{key}.json` so they can be inspected after the staged
//! key has been deleted. Existing files are never overwritten; a clashing
//! name gets a `_1`, `_2`, ... suffix.
//!
//! Errors are logged and swallowed. Dead-lettering is best-effort and must
//! never stop a drain run.

use std::io;
use std::path::{Path, PathBuf};

use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

/// Suffixes tried before giving up on a clashing file name.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Clone)]
pub struct DeadLetterLog {
    dir: PathBuf,
}

impl DeadLetterLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record `bytes` for the staged `key`, along with the parse failure in
    /// the log line. Returns the written path on success.
    pub async fn record(&self, key: &str, reason: &str, bytes: &[u8]) -> Option<PathBuf> {
        warn!(
            target: "dead_letter",
            key = %key,
            reason = %reason,
            payload = %String::from_utf8_lossy(bytes),
            "Malformed staged payload"
        );

        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let stem = format!("{ts}_{}", sanitize(key));

        if let Err(e) = fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "dead_letter: failed to create directory");
            return None;
        }

        // Pretty-print the JSON if valid; fall back to raw bytes otherwise.
        let content = match serde_json::from_slice::<serde_json::Value>(bytes) {
            Ok(v) => serde_json::to_vec_pretty(&v).unwrap_or_else(|_| bytes.to_vec()),
            Err(_) => bytes.to_vec(),
        };

        match self.write_new(&stem, &content).await {
            Ok(path) => {
                debug!(path = %path.display(), bytes = content.len(), "dead_letter: saved");
                Some(path)
            }
            Err(e) => {
                warn!(stem = %stem, error = %e, "dead_letter: failed to write payload file");
                None
            }
        }
    }

    async fn write_new(&self, stem: &str, content: &[u8]) -> io::Result<PathBuf> {
        let mut attempt = 0u32;
        loop {
            let name = match attempt {
                0 => format!("{stem}.json"),
                n => format!("{stem}_{n}.json"),
            };
            let path = self.dir.join(name);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(content).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Staging keys look like `AA:BB:CC:1700000000`; keep file names portable.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}
