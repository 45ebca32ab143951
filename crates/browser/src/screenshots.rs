//! Screenshot persistence
//!
//! Captured frames land under `.shortest/screenshots` inside the working
//! directory. File names combine a millisecond UTC timestamp with a
//! process-wide counter so two captures in the same millisecond never
//! collide.

use crate::error::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directory screenshots are written to, relative to `working_dir`.
pub fn screenshots_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".shortest").join("screenshots")
}

/// Creates the screenshot directory tree if it does not exist yet.
pub async fn ensure_screenshots_dir(working_dir: &Path) -> Result<PathBuf> {
    let dir = screenshots_dir(working_dir);
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

fn next_screenshot_path(dir: &Path) -> PathBuf {
    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    dir.join(format!("screenshot-{timestamp}-{sequence}.png"))
}

/// Persists one captured frame, returning the path it was written to.
pub async fn save_screenshot(working_dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let dir = ensure_screenshots_dir(working_dir).await?;
    let path = next_screenshot_path(&dir);
    tokio::fs::write(&path, bytes).await?;
    debug!("[Screenshots] Saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
