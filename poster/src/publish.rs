use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a publish attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStatus {
    Published,
    /// A newer notification already landed; this render was dropped.
    Superseded { latest: u64 },
}

/// Sole writer of the published artwork file.
///
/// Every publish writes a uniquely named sibling temp file and renames it over
/// the final path, so readers see either the old or the new file in full.
/// The lock only covers the sequence check and the rename.
pub struct Publisher {
    path: PathBuf,
    last_sequence: Mutex<Option<u64>>,
}

impl Publisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_sequence: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the output directory if needed. Called once at startup.
    pub async fn ensure_dir(&self) -> Result<(), PublishError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::CreateDir(parent.display().to_string(), e))?;
        }
        Ok(())
    }

    /// Atomically replace the published file with `bytes`.
    ///
    /// Renders carrying a `sequence` lower than the last published one are
    /// discarded. On error the previous file is left as it was.
    pub async fn publish(&self, bytes: &[u8], sequence: u64) -> Result<PublishStatus, PublishError> {
        let tmp_path = self
            .path
            .with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));

        if let Err(e) = write_temp(&tmp_path, bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        let mut last = self.last_sequence.lock().await;
        if let Some(latest) = *last {
            if sequence < latest {
                drop(last);
                let _ = tokio::fs::remove_file(&tmp_path).await;
                info!(sequence, latest, "newer artwork already published, dropping render");
                return Ok(PublishStatus::Superseded { latest });
            }
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(PublishError::Rename(self.path.display().to_string(), e));
        }
        *last = Some(sequence);
        drop(last);

        // Best-effort fsync of the directory so the rename survives a crash.
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            match tokio::fs::File::open(parent).await {
                Ok(dir) => {
                    if let Err(e) = dir.sync_all().await {
                        warn!(error = %e, "failed to sync output directory");
                    }
                }
                Err(e) => warn!(error = %e, "failed to open output directory for sync"),
            }
        }

        debug!(
            path = self.path.display().to_string(),
            bytes = bytes.len(),
            sequence,
            "published artwork"
        );
        Ok(PublishStatus::Published)
    }
}

async fn write_temp(tmp_path: &Path, bytes: &[u8]) -> Result<(), PublishError> {
    let err = |e| PublishError::WriteTemp(tmp_path.display().to_string(), e);
    let mut file = tokio::fs::File::create(tmp_path).await.map_err(err)?;
    file.write_all(bytes).await.map_err(err)?;
    file.flush().await.map_err(err)?;
    file.sync_all().await.map_err(err)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to create output directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to write temp file {0}: {1}")]
    WriteTemp(String, std::io::Error),
    #[error("failed to replace {0}: {1}")]
    Rename(String, std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn publish_replaces_file_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Publisher::new(dir.path().join("out").join("now-playing.png"));
        publisher.ensure_dir().await.unwrap();

        assert_eq!(publisher.publish(b"first", 1).await.unwrap(), PublishStatus::Published);
        assert_eq!(publisher.publish(b"second", 2).await.unwrap(), PublishStatus::Published);

        assert_eq!(std::fs::read(publisher.path()).unwrap(), b"second");
        assert_eq!(entries(&dir.path().join("out")), vec!["now-playing.png"]);
    }

    #[tokio::test]
    async fn stale_sequence_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Publisher::new(dir.path().join("now-playing.png"));

        publisher.publish(b"newer", 5).await.unwrap();
        let status = publisher.publish(b"older", 3).await.unwrap();

        assert_eq!(status, PublishStatus::Superseded { latest: 5 });
        assert_eq!(std::fs::read(publisher.path()).unwrap(), b"newer");
        assert_eq!(entries(dir.path()), vec!["now-playing.png"]);
    }

    #[tokio::test]
    async fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("now-playing.png");
        // A non-empty directory at the target path makes the rename fail.
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();
        let publisher = Publisher::new(&target);

        let err = publisher.publish(b"bytes", 1).await.unwrap_err();
        assert!(matches!(err, PublishError::Rename(..)));
        assert_eq!(entries(dir.path()), vec!["now-playing.png"]);
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn failed_write_leaves_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Publisher::new(dir.path().join("missing").join("now-playing.png"));

        let err = publisher.publish(b"bytes", 1).await.unwrap_err();
        assert!(matches!(err, PublishError::WriteTemp(..)));
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_see_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(Publisher::new(dir.path().join("now-playing.png")));

        let small = vec![0xAAu8; 256 * 1024];
        let large = vec![0xBBu8; 2 * 1024 * 1024];
        publisher.publish(&small, 0).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let path = publisher.path().to_path_buf();
            let done = Arc::clone(&done);
            let (small, large) = (small.clone(), large.clone());
            tokio::task::spawn_blocking(move || {
                let mut reads = 0u32;
                while !done.load(Ordering::SeqCst) {
                    let data = std::fs::read(&path).unwrap();
                    assert!(data == small || data == large, "observed {} mixed bytes", data.len());
                    reads += 1;
                }
                reads
            })
        };

        for seq in 1..=40u64 {
            let bytes = if seq % 2 == 0 { &small } else { &large };
            publisher.publish(bytes, seq).await.unwrap();
        }
        done.store(true, Ordering::SeqCst);

        let reads = reader.await.unwrap();
        assert!(reads > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_keep_newest() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(Publisher::new(dir.path().join("now-playing.png")));

        let mut handles = Vec::new();
        for seq in 0..16u64 {
            let publisher = Arc::clone(&publisher);
            handles.push(tokio::spawn(async move {
                let bytes = vec![seq as u8; 64 * 1024 + seq as usize];
                publisher.publish(&bytes, seq).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let data = std::fs::read(publisher.path()).unwrap();
        assert_eq!(data, vec![15u8; 64 * 1024 + 15]);
        assert_eq!(entries(dir.path()), vec!["now-playing.png"]);
    }
}
