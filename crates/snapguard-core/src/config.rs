use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SnapguardError};

/// Top-level configuration for the Snapguard application.
///
/// Loaded from `~/.snapguard/config.toml` by default. Each section
/// corresponds to a bounded context. The loaded value is immutable and is
/// passed into component constructors; components never reach for ambient
/// configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapguardConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

impl Default for SnapguardConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            watch: WatchConfig::default(),
            upload: UploadConfig::default(),
            classify: ClassifyConfig::default(),
            retention: RetentionConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl SnapguardConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SnapguardConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SnapguardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and managed screenshot copies.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.snapguard/data".to_string(),
            log_level: "info".to_string(),
            port: 3030,
        }
    }
}

/// Screenshot detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directories scanned for new screenshots.
    pub directories: Vec<String>,
    /// Seconds between directory scans.
    pub poll_interval_secs: u64,
    /// Milliseconds a file's size must stay unchanged before it is
    /// considered fully written.
    pub quiet_period_ms: u64,
    /// Number of size probes during stabilization.
    pub stability_checks: u32,
    /// Maximum number of paths remembered by the dedup set.
    pub dedup_capacity: usize,
    /// Seconds before a remembered path ages out of the dedup set.
    pub dedup_ttl_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directories: vec!["~/Desktop".to_string(), "~/Downloads".to_string()],
            poll_interval_secs: 2,
            quiet_period_ms: 1000,
            stability_checks: 3,
            dedup_capacity: 4096,
            dedup_ttl_secs: 86_400,
        }
    }
}

/// Upload backend settings. A backend is only added to the chain when its
/// section carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub cloudinary: Option<CloudinaryConfig>,
    pub imgur: Option<ImgurConfig>,
    /// Host used for the degraded local fallback URL
    /// (`http://<host>/uploads/<filename>`).
    pub fallback_host: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cloudinary: None,
            imgur: None,
            fallback_host: "127.0.0.1:3030".to_string(),
        }
    }
}

/// Cloudinary unsigned upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub upload_preset: String,
    /// Remote folder the screenshots are organized under.
    pub folder: String,
    /// Tags attached to each uploaded asset.
    pub tags: Vec<String>,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            upload_preset: String::new(),
            folder: "snapguard".to_string(),
            tags: vec!["snapguard".to_string(), "screenshot".to_string()],
        }
    }
}

/// Imgur anonymous upload settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImgurConfig {
    pub client_id: String,
}

/// External classification engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Command used to invoke the engine. Run with the staging directory
    /// as its working directory.
    pub command: String,
    /// Arguments passed to the command.
    pub args: Vec<String>,
    /// Name of the engine pipeline to execute.
    pub pipe_code: String,
    /// Wall-clock bound on a single invocation.
    pub timeout_secs: u64,
    /// Root under which per-invocation staging directories are created.
    pub staging_dir: String,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["-m".to_string(), "sensitivity_engine".to_string()],
            pipe_code: "assess_image_sensitivity".to_string(),
            timeout_secs: 120,
            staging_dir: "~/.snapguard/staging".to_string(),
        }
    }
}

/// Retention sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Seconds between deletion sweeps.
    pub sweep_interval_secs: u64,
    /// Default grace period applied when a deletion is scheduled without an
    /// explicit date.
    pub default_grace_hours: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600,
            default_grace_hours: 24,
        }
    }
}

/// Ruleset override settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Optional path to a file whose contents replace the built-in ruleset.
    pub rules_file: Option<String>,
}
