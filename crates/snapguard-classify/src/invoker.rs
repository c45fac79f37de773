//! External engine invocation with staged input/output artifacts.
//!
//! Each invocation gets a private staging directory keyed by a fresh run id,
//! so concurrent classifications of different files never share artifact
//! paths. The engine command runs with the staging directory as its working
//! directory: it reads `inputs.json` and must write `result.json` before
//! exiting.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use snapguard_core::config::ClassifyConfig;
use snapguard_core::types::Verdict;

use crate::verdict::parse_verdict;
use crate::{Classifier, ClassifyError};

const INPUTS_FILE: &str = "inputs.json";
const RESULT_FILE: &str = "result.json";

/// Invokes the external classification engine as a child process.
pub struct EngineInvoker {
    command: String,
    args: Vec<String>,
    pipe_code: String,
    timeout: Duration,
    staging_root: PathBuf,
}

impl EngineInvoker {
    /// Build an invoker from config, staging runs under `staging_root`.
    pub fn new(config: &ClassifyConfig, staging_root: PathBuf) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            pipe_code: config.pipe_code.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            staging_root,
        }
    }

    async fn run_in_staging(
        &self,
        staging: &Path,
        image_url: &str,
        rules_text: &str,
    ) -> Result<Verdict, ClassifyError> {
        let inputs = serde_json::json!({
            "pipe_code": self.pipe_code,
            "image": {
                "concept": "native.Image",
                "content": { "url": image_url },
            },
            "rules": {
                "concept": "native.Text",
                "content": rules_text,
            },
        });
        tokio::fs::write(
            staging.join(INPUTS_FILE),
            serde_json::to_vec_pretty(&inputs)?,
        )
        .await?;

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .current_dir(staging)
            .kill_on_drop(true);

        debug!(command = %self.command, staging = %staging.display(), "Invoking classification engine");

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(ClassifyError::Timeout(self.timeout.as_secs())),
        };

        if !output.status.success() {
            return Err(ClassifyError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let raw = tokio::fs::read(staging.join(RESULT_FILE))
            .await
            .map_err(|_| {
                ClassifyError::MalformedVerdict("engine produced no result file".to_string())
            })?;

        let value: serde_json::Value = serde_json::from_slice(&raw).map_err(|e| {
            ClassifyError::MalformedVerdict(format!("result file is not valid JSON: {}", e))
        })?;

        parse_verdict(&value)
    }
}

#[async_trait]
impl Classifier for EngineInvoker {
    async fn classify(
        &self,
        image_url: &str,
        rules_text: &str,
    ) -> Result<Verdict, ClassifyError> {
        let run_id = Uuid::new_v4();
        let staging = self.staging_root.join(run_id.to_string());
        tokio::fs::create_dir_all(&staging).await?;

        let result = self.run_in_staging(&staging, image_url, rules_text).await;

        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!(staging = %staging.display(), error = %e, "Failed to clean staging directory");
        }

        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn make_invoker(staging_root: PathBuf, script: &str, timeout_secs: u64) -> EngineInvoker {
        let config = ClassifyConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            pipe_code: "assess_image_sensitivity".to_string(),
            timeout_secs,
            staging_dir: String::new(),
        };
        EngineInvoker::new(&config, staging_root)
    }

    fn staging_is_empty(root: &Path) -> bool {
        match std::fs::read_dir(root) {
            Ok(entries) => entries.count() == 0,
            Err(_) => true,
        }
    }

    #[tokio::test]
    async fn test_successful_invocation() {
        let root = tempfile::tempdir().unwrap();
        let script = r#"echo '{"classification":"public","sensitivity_rating":1,"should_be_deleted":false,"reasoning":"ok"}' > result.json"#;
        let invoker = make_invoker(root.path().to_path_buf(), script, 30);

        let verdict = invoker
            .classify("https://images.example/a.png", "# Rules")
            .await
            .unwrap();
        assert_eq!(verdict.classification, "public");
        assert_eq!(verdict.sensitivity_rating, 1);
        assert!(staging_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_engine_reads_input_envelope() {
        let root = tempfile::tempdir().unwrap();
        // The engine only produces a result when the envelope carries the
        // pipe code and the image URL it expects.
        let script = r#"grep -q assess_image_sensitivity inputs.json && grep -q 'images.example/a.png' inputs.json && echo '{"classification":"public","sensitivity_rating":0,"should_be_deleted":false}' > result.json"#;
        let invoker = make_invoker(root.path().to_path_buf(), script, 30);

        let verdict = invoker
            .classify("https://images.example/a.png", "# Rules")
            .await
            .unwrap();
        assert_eq!(verdict.sensitivity_rating, 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_engine_failure() {
        let root = tempfile::tempdir().unwrap();
        let invoker = make_invoker(
            root.path().to_path_buf(),
            "echo boom >&2; exit 3",
            30,
        );

        let err = invoker.classify("http://x/a.png", "rules").await.unwrap_err();
        match err {
            ClassifyError::EngineFailed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("expected EngineFailed, got {:?}", other),
        }
        assert!(staging_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_timeout_kills_invocation() {
        let root = tempfile::tempdir().unwrap();
        let invoker = make_invoker(root.path().to_path_buf(), "sleep 30", 1);

        let err = invoker.classify("http://x/a.png", "rules").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Timeout(1)));
        assert!(staging_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_missing_result_file_is_malformed() {
        let root = tempfile::tempdir().unwrap();
        let invoker = make_invoker(root.path().to_path_buf(), "true", 30);

        let err = invoker.classify("http://x/a.png", "rules").await.unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedVerdict(_)));
    }

    #[tokio::test]
    async fn test_invalid_json_result_is_malformed() {
        let root = tempfile::tempdir().unwrap();
        let invoker = make_invoker(
            root.path().to_path_buf(),
            "echo 'not json' > result.json",
            30,
        );

        let err = invoker.classify("http://x/a.png", "rules").await.unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedVerdict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_invocations_use_private_staging() {
        let root = tempfile::tempdir().unwrap();
        // Each invocation echoes its own URL back; shared staging would make
        // one run clobber the other's artifacts.
        let script = r#"url=$(grep -o 'http[^"]*' inputs.json | head -1); printf '{"classification":"public","sensitivity_rating":0,"should_be_deleted":false,"reasoning":"%s"}' "$url" > result.json"#;
        let invoker = std::sync::Arc::new(make_invoker(root.path().to_path_buf(), script, 30));

        let a = {
            let invoker = std::sync::Arc::clone(&invoker);
            tokio::spawn(async move { invoker.classify("http://x/a.png", "rules").await })
        };
        let b = {
            let invoker = std::sync::Arc::clone(&invoker);
            tokio::spawn(async move { invoker.classify("http://x/b.png", "rules").await })
        };

        let verdict_a = a.await.unwrap().unwrap();
        let verdict_b = b.await.unwrap().unwrap();
        assert_eq!(verdict_a.reasoning, "http://x/a.png");
        assert_eq!(verdict_b.reasoning, "http://x/b.png");
        assert!(staging_is_empty(root.path()));
    }
}
