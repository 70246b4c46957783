//! Locating the run directory the measurement tool produced.
//!
//! The tool writes each run to `<results_root>/<target>/<timestamp>/` and
//! does not mark which run is the newest. The newest run is taken to be the
//! immediate subdirectory with the greatest modification time; runs are
//! serialised by the execution queue, so that is the run that just finished.
//! Ties on mtime fall back to the lexicographically greatest name.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use url::Url;

use super::RESULT_FILE_NAME;

/// Failure to find or read a run's result artifact.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Result file not found in {}", domain_dir.display())]
    NotFound {
        domain_dir: PathBuf,
        latest_folder: Option<PathBuf>,
    },

    #[error("Result file in {} could not be read: {message}", latest_folder.display())]
    Unreadable {
        domain_dir: PathBuf,
        latest_folder: PathBuf,
        message: String,
    },
}

/// Where a run's result artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLocation {
    /// `<results_root>/<target>`.
    pub domain_dir: PathBuf,
    /// Newest run directory inside `domain_dir`.
    pub run_dir: PathBuf,
}

impl ResultLocation {
    pub fn result_file(&self) -> PathBuf {
        self.run_dir.join(RESULT_FILE_NAME)
    }
}

/// Per-target directory name: the hostname, plus `-<path>` when the URL has
/// a non-root path (slashes trimmed at both ends, inner slashes as `-`).
///
/// `https://wearelucid.ch/projekte/sateco/` becomes `wearelucid.ch-projekte-sateco`.
pub fn target_dir_name(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    let path = url.path().trim_matches('/');

    if path.is_empty() {
        host.to_string()
    } else {
        format!("{host}-{}", path.replace('/', "-"))
    }
}

/// Find the result file of the newest run for `url` under `results_root`.
pub async fn locate_result_file(
    results_root: &Path,
    url: &Url,
) -> Result<ResultLocation, ExtractError> {
    let domain_dir = results_root.join(target_dir_name(url));

    let latest = match latest_run_dir(&domain_dir).await {
        Ok(latest) => latest,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    domain_dir = %domain_dir.display(),
                    error = %e,
                    "Failed to scan result directory",
                );
            }
            None
        }
    };

    let Some(run_dir) = latest else {
        return Err(ExtractError::NotFound {
            domain_dir,
            latest_folder: None,
        });
    };

    let location = ResultLocation {
        domain_dir,
        run_dir,
    };

    let exists = tokio::fs::try_exists(location.result_file())
        .await
        .unwrap_or(false);
    if !exists {
        return Err(ExtractError::NotFound {
            domain_dir: location.domain_dir,
            latest_folder: Some(location.run_dir),
        });
    }

    Ok(location)
}

/// The immediate subdirectory of `dir` with the greatest mtime, if any.
pub async fn latest_run_dir(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut latest: Option<(SystemTime, String, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }

        let modified = metadata.modified()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let newer = match &latest {
            None => true,
            Some((best_time, best_name, _)) => (modified, &name) > (*best_time, best_name),
        };
        if newer {
            latest = Some((modified, name, path));
        }
    }

    Ok(latest.map(|(_, _, path)| path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
