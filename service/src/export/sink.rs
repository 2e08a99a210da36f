//! Destinations for finished snapshots.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where an uploaded snapshot ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub container: String,
    pub name: String,
    /// Sink-specific address (file path, `gs://` URI, ...).
    pub location: String,
    pub size: usize,
}

/// Errors raised while persisting a snapshot.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload rejected: {status} - {message}")]
    Rejected { status: u16, message: String },
}

/// Capability to store a named blob in a named container.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Store `bytes` as `name` inside `container`.
    async fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, SinkError>;
}

/// Sink writing `<root>/<container>/<name>` on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirectorySink {
    root: PathBuf,
}

impl LocalDirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactSink for LocalDirectorySink {
    async fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactHandle, SinkError> {
        let dir = self.root.join(container);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SinkError::Io {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(name);
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(ArtifactHandle {
            container: container.to_string(),
            name: name.to_string(),
            location: path.display().to_string(),
            size,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::missing_const_for_fn,
    clippy::must_use_candidate
)]
pub mod mock {
    //! In-memory sinks for tests.

    use super::{ArtifactHandle, ArtifactSink, SinkError};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// An upload captured by [`MemorySink`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredArtifact {
        pub container: String,
        pub name: String,
        pub bytes: Vec<u8>,
    }

    /// Sink keeping every upload in memory. Clones share storage, so keep a
    /// clone to inspect what the exporter uploaded.
    #[derive(Debug, Clone, Default)]
    pub struct MemorySink {
        uploads: Arc<Mutex<Vec<StoredArtifact>>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn uploads(&self) -> Vec<StoredArtifact> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactSink for MemorySink {
        async fn upload(
            &self,
            container: &str,
            name: &str,
            bytes: Vec<u8>,
        ) -> Result<ArtifactHandle, SinkError> {
            let size = bytes.len();
            self.uploads.lock().unwrap().push(StoredArtifact {
                container: container.to_string(),
                name: name.to_string(),
                bytes,
            });
            Ok(ArtifactHandle {
                container: container.to_string(),
                name: name.to_string(),
                location: format!("memory://{container}/{name}"),
                size,
            })
        }
    }

    /// Sink that rejects every upload.
    #[derive(Debug, Clone, Default)]
    pub struct FailingSink;

    #[async_trait]
    impl ArtifactSink for FailingSink {
        async fn upload(
            &self,
            _container: &str,
            _name: &str,
            _bytes: Vec<u8>,
        ) -> Result<ArtifactHandle, SinkError> {
            Err(SinkError::Rejected {
                status: 503,
                message: "sink unavailable".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_sink_writes_under_container_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = LocalDirectorySink::new(dir.path());

        let handle = sink
            .upload("camara_deputados", "despesas.csv", b"a,b\n1,2\n".to_vec())
            .await
            .expect("upload should succeed");

        let path = dir.path().join("camara_deputados").join("despesas.csv");
        assert_eq!(std::fs::read(&path).expect("file written"), b"a,b\n1,2\n");
        assert_eq!(handle.size, 8);
        assert_eq!(handle.location, path.display().to_string());
    }

    #[tokio::test]
    async fn local_sink_overwrites_same_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = LocalDirectorySink::new(dir.path());

        sink.upload("c", "f.csv", b"old".to_vec())
            .await
            .expect("first upload");
        sink.upload("c", "f.csv", b"new".to_vec())
            .await
            .expect("second upload");

        let contents = std::fs::read(dir.path().join("c").join("f.csv")).expect("file written");
        assert_eq!(contents, b"new");
    }

    #[tokio::test]
    async fn local_sink_reports_io_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write blocker");

        let sink = LocalDirectorySink::new(&blocker);
        let result = sink.upload("c", "f.csv", Vec::new()).await;

        assert!(matches!(result, Err(SinkError::Io { .. })));
    }
}
