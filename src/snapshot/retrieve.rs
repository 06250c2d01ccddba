use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::auth::Session;
use crate::error::{RemoteError, RetrievalError, ValidationError};
use crate::ring::{DeviceId, RingApi};

use super::validate::validate_image;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// One snapshot retrieval, fixed for its whole duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub device_id: DeviceId,
    pub force_refresh: bool,
    pub validate_image: bool,
    /// At least 1; 1 means no retry.
    pub max_attempts: u32,
    pub output_path: PathBuf,
}

/// Fixed delays of the pipeline. No backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub settle_delay: Duration,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// What a single pass through download, validate and persist ended with.
/// Exactly one step is blamed for a failed attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    DownloadFailed(RemoteError),
    ValidationFailed(ValidationError),
    PersistFailed(io::Error),
    Succeeded { bytes: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    pub path: PathBuf,
    pub attempts: u32,
    pub bytes: usize,
}

/// Download the latest snapshot to `request.output_path`, retrying the whole
/// pipeline until one attempt succeeds end to end or the attempts run out.
pub fn retrieve<A: RingApi + ?Sized>(
    api: &A,
    session: &Session,
    request: &SnapshotRequest,
    policy: &RetryPolicy,
) -> Result<Retrieved, RetrievalError> {
    let max_attempts = request.max_attempts.max(1);
    let mut attempt = 0;

    debug!(
        "Retrieving snapshot of device {} (fresh capture: {}, validate: {})",
        request.device_id, request.force_refresh, request.validate_image
    );
    eprintln!(
        "Downloading snapshot from Ring device with ID {} to {}",
        request.device_id,
        request.output_path.display()
    );

    while attempt < max_attempts {
        attempt += 1;

        match run_attempt(api, session, request) {
            AttemptOutcome::Succeeded { bytes } => {
                eprintln!(
                    "Saved {} bytes to {} ({}/{})",
                    bytes,
                    request.output_path.display(),
                    attempt,
                    max_attempts
                );
                return Ok(Retrieved {
                    path: request.output_path.clone(),
                    attempts: attempt,
                    bytes,
                });
            }
            failure => report_failure(&failure, attempt, max_attempts),
        }

        if attempt < max_attempts {
            thread::sleep(policy.retry_delay);
        }
    }

    Err(RetrievalError::Exhausted {
        attempts: attempt,
        max_attempts,
    })
}

fn run_attempt<A: RingApi + ?Sized>(
    api: &A,
    session: &Session,
    request: &SnapshotRequest,
) -> AttemptOutcome {
    let bytes = match api.fetch_image(session, request.device_id) {
        Ok(bytes) => bytes,
        Err(e) => return AttemptOutcome::DownloadFailed(e),
    };
    debug!("Downloaded {} bytes", bytes.len());

    if request.validate_image {
        match validate_image(&bytes) {
            Ok(format) => eprintln!("Snapshot is a valid {:?} image", format),
            Err(e) => return AttemptOutcome::ValidationFailed(e),
        }
    }

    match persist(&request.output_path, &bytes) {
        Ok(()) => AttemptOutcome::Succeeded { bytes: bytes.len() },
        Err(e) => AttemptOutcome::PersistFailed(e),
    }
}

fn report_failure(outcome: &AttemptOutcome, attempt: u32, max_attempts: u32) {
    match outcome {
        AttemptOutcome::DownloadFailed(e) if e.is_not_found() => eprintln!(
            "Not found returned by Ring API, retrying ({}/{})",
            attempt, max_attempts
        ),
        AttemptOutcome::DownloadFailed(e) => {
            eprintln!("Download failed: {} ({}/{})", e, attempt, max_attempts)
        }
        AttemptOutcome::ValidationFailed(e) => {
            eprintln!("Downloaded snapshot rejected: {} ({}/{})", e, attempt, max_attempts)
        }
        AttemptOutcome::PersistFailed(e) => {
            eprintln!("Could not save snapshot: {} ({}/{})", e, attempt, max_attempts)
        }
        AttemptOutcome::Succeeded { .. } => {}
    }
}

/// Write to a sibling temp file and rename it into place, so a failed write
/// never leaves a truncated file at `path`.
fn persist(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = temp_file_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;

    let written = file.as_file().metadata()?.len();
    if written != bytes.len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("wrote {} of {} bytes", written, bytes.len()),
        ));
    }

    file.persist(path).map_err(|e| e.error)?;
    debug!("Persisted snapshot to {}", path.display());
    Ok(())
}

/// Temp files default to 0600. Ask for 0666 so the umask decides, as it does
/// for a plain `File::create`.
fn temp_file_in(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".ringsnap-");
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}
