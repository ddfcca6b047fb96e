//! Screen captures and change detection

use crate::error::{Error, Result};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// A full-screen RGBA capture.
pub type Screenshot = RgbaImage;

/// Decides whether two captures differ enough to count as a visible effect.
pub trait ScreenChangePolicy: Send + Sync {
    fn changed(&self, before: &Screenshot, after: &Screenshot) -> bool;
}

/// Mean absolute per-channel difference, as a fraction of the maximum.
#[derive(Debug, Clone, Copy)]
pub struct PixelDiffPolicy {
    /// Change ratio at or above which the screen counts as changed (0.001 = 0.1%).
    pub ratio_threshold: f64,
}

impl Default for PixelDiffPolicy {
    fn default() -> Self {
        Self { ratio_threshold: 0.001 }
    }
}

impl PixelDiffPolicy {
    pub fn new(ratio_threshold: f64) -> Self {
        Self { ratio_threshold }
    }
}

impl ScreenChangePolicy for PixelDiffPolicy {
    fn changed(&self, before: &Screenshot, after: &Screenshot) -> bool {
        if before.dimensions() != after.dimensions() {
            return true;
        }
        diff_ratio(before, after) >= self.ratio_threshold
    }
}

/// Sum of absolute channel differences over `len * 255`. Captures with
/// different dimensions count as fully changed.
pub fn diff_ratio(before: &Screenshot, after: &Screenshot) -> f64 {
    if before.dimensions() != after.dimensions() {
        return 1.0;
    }
    let raw_a = before.as_raw();
    let raw_b = after.as_raw();
    if raw_a.is_empty() {
        return 0.0;
    }
    let total: u64 = raw_a
        .iter()
        .zip(raw_b.iter())
        .map(|(a, b)| a.abs_diff(*b) as u64)
        .sum();
    total as f64 / (raw_a.len() as f64 * 255.0)
}

pub fn encode_png(shot: &Screenshot) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    shot.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::interaction("encode screenshot", e))?;
    Ok(buf.into_inner())
}

pub fn save_png(shot: &Screenshot, path: &Path) -> Result<()> {
    shot.save_with_format(path, ImageFormat::Png)
        .map_err(|e| Error::persistence(format!("Failed to save {}: {}", path.display(), e)))
}
