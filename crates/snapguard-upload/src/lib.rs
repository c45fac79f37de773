//! Snapguard upload crate - image hosting backends and the fallback chain.
//!
//! Turns a local screenshot copy into a publicly dereferenceable URL by
//! trying configured backends strictly in priority order. Each backend gets
//! exactly one attempt per file; failures are logged and swallowed until the
//! chain is exhausted. The caller decides what to do on exhaustion (the
//! orchestrator degrades to a local URL).

pub mod cloudinary;
pub mod imgur;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::{info, warn};

use snapguard_core::error::SnapguardError;

pub use cloudinary::CloudinaryBackend;
pub use imgur::ImgurBackend;

/// Errors from upload backends and the chain.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Backend '{name}' failed: {message}")]
    Backend { name: String, message: String },
    #[error("All upload backends failed")]
    AllBackendsFailed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<UploadError> for SnapguardError {
    fn from(err: UploadError) -> Self {
        SnapguardError::Upload(err.to_string())
    }
}

/// A single image hosting backend.
///
/// `upload` makes exactly one attempt; retry policy lives in the chain
/// (which is: none, the next backend is the retry).
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Upload the file and return its public URL.
    async fn upload(&self, path: &Path) -> Result<String, UploadError>;
}

/// Ordered chain of upload backends with fallback.
#[derive(Default)]
pub struct UploadChain {
    backends: Vec<Box<dyn UploadBackend>>,
}

impl UploadChain {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Append a backend; earlier backends have higher priority.
    pub fn with_backend(mut self, backend: Box<dyn UploadBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Try each backend in order, returning the first successful URL.
    ///
    /// Individual backend failures are logged and swallowed. Returns
    /// `UploadError::AllBackendsFailed` when no backend succeeds (including
    /// an empty chain).
    pub async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        for backend in &self.backends {
            match backend.upload(path).await {
                Ok(url) => {
                    info!(backend = backend.name(), url = %url, "Upload succeeded");
                    return Ok(url);
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Upload backend failed");
                }
            }
        }
        Err(UploadError::AllBackendsFailed)
    }
}

/// Degraded local URL used when every backend fails:
/// `http://<host>/uploads/<filename>`.
pub fn local_fallback_url(host: &str, file_name: &str) -> String {
    format!("http://{}/uploads/{}", host, file_name)
}

/// Test backend with a scripted outcome and an attempt counter.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    result_url: Option<String>,
    calls: AtomicUsize,
}

impl MockBackend {
    /// A mock that succeeds with the given URL.
    pub fn succeeding(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            result_url: Some(url.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    /// A mock that always fails.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result_url: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, _path: &Path) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.result_url {
            Some(url) => Ok(url.clone()),
            None => Err(UploadError::Backend {
                name: self.name.clone(),
                message: "mock failure".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    // Wrapper so tests can keep a handle to the mock after boxing it.
    struct SharedBackend(Arc<MockBackend>);

    #[async_trait]
    impl UploadBackend for SharedBackend {
        fn name(&self) -> &str {
            self.0.name()
        }
        async fn upload(&self, path: &Path) -> Result<String, UploadError> {
            self.0.upload(path).await
        }
    }

    fn dummy_path() -> PathBuf {
        PathBuf::from("/tmp/screenshot-test.png")
    }

    #[tokio::test]
    async fn test_first_backend_success_short_circuits() {
        let a = Arc::new(MockBackend::succeeding("a", "https://a.example/1.png"));
        let b = Arc::new(MockBackend::succeeding("b", "https://b.example/1.png"));
        let chain = UploadChain::new()
            .with_backend(Box::new(SharedBackend(Arc::clone(&a))))
            .with_backend(Box::new(SharedBackend(Arc::clone(&b))));

        let url = chain.upload(&dummy_path()).await.unwrap();
        assert_eq!(url, "https://a.example/1.png");
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_to_second_backend() {
        let a = Arc::new(MockBackend::failing("a"));
        let b = Arc::new(MockBackend::succeeding("b", "https://b.example/1.png"));
        let chain = UploadChain::new()
            .with_backend(Box::new(SharedBackend(Arc::clone(&a))))
            .with_backend(Box::new(SharedBackend(Arc::clone(&b))));

        let url = chain.upload(&dummy_path()).await.unwrap();
        assert_eq!(url, "https://b.example/1.png");
        // Exactly one attempt per backend, no intra-backend retry.
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_backends_failed() {
        let a = Arc::new(MockBackend::failing("a"));
        let b = Arc::new(MockBackend::failing("b"));
        let chain = UploadChain::new()
            .with_backend(Box::new(SharedBackend(Arc::clone(&a))))
            .with_backend(Box::new(SharedBackend(Arc::clone(&b))));

        let err = chain.upload(&dummy_path()).await.unwrap_err();
        assert!(matches!(err, UploadError::AllBackendsFailed));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_fails() {
        let chain = UploadChain::new();
        assert!(chain.is_empty());
        let err = chain.upload(&dummy_path()).await.unwrap_err();
        assert!(matches!(err, UploadError::AllBackendsFailed));
    }

    #[test]
    fn test_local_fallback_url_form() {
        assert_eq!(
            local_fallback_url("127.0.0.1:3030", "screenshot-abc.png"),
            "http://127.0.0.1:3030/uploads/screenshot-abc.png"
        );
    }

    #[test]
    fn test_upload_error_into_top_level() {
        let err: SnapguardError = UploadError::AllBackendsFailed.into();
        assert!(matches!(err, SnapguardError::Upload(_)));
        assert!(err.to_string().contains("All upload backends failed"));
    }
}
