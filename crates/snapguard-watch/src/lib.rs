//! Snapguard watch crate - screenshot detection.
//!
//! Provides the filename heuristics that decide whether a new file looks
//! like a screenshot, an async stabilization probe that waits for a file to
//! be fully written, and a poll-based directory watcher that emits detection
//! events. The OS-level change-notification mechanism is an external
//! concern; the watcher polls on a timer instead.

pub mod watcher;

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

pub use watcher::DirectoryWatcher;

/// Image extensions considered for screenshot detection.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

fn name_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^screenshot",
            r"^screen shot",
            r"^capture",
            r"^screen_recording",
            r"^screen recording",
            r"^cleanshot",
            // macOS "2024-03-01 at 9.15.02 AM" form.
            r"^\d{4}-\d{2}-\d{2} at \d",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("screenshot pattern is valid"))
        .collect()
    })
}

/// Decide whether a path looks like a screenshot file.
///
/// Requires a common raster image extension and a filename matching one of
/// the known screenshot naming patterns. Matching is case-insensitive.
pub fn is_screenshot_file(path: &Path) -> bool {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_lowercase(),
        None => return false,
    };

    if file_name.starts_with('.') {
        return false;
    }

    let has_image_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false);

    has_image_ext && name_patterns().iter().any(|p| p.is_match(&file_name))
}

/// Wait until a file is fully written: it exists, is non-empty, and its size
/// stays unchanged across one quiet period.
///
/// Returns the stable size, or `None` when the file vanished, stayed empty,
/// or kept growing past the allowed number of probes. Callers abort the
/// pipeline for this file silently on `None`.
pub async fn wait_for_stable(path: &Path, quiet_period: Duration, checks: u32) -> Option<u64> {
    let mut last_size: Option<u64> = None;

    for _ in 0..checks.max(1) {
        tokio::time::sleep(quiet_period).await;

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                debug!(path = %path.display(), "File vanished during stabilization");
                return None;
            }
        };

        if size > 0 && last_size == Some(size) {
            return Some(size);
        }
        last_size = Some(size);
    }

    debug!(path = %path.display(), "File never stabilized");
    None
}
