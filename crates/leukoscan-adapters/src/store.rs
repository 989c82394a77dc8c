//! Filesystem result store.
//!
//! Layout under the root directory:
//!
//! ```text
//! {ts}_{name}                          uploaded bytes, unchanged
//! two_eyes/{ts}_{side}_{name}          eye crop, iris box drawn in green
//! iris_crops/{ts}_iris_{side}_{stem}.png   enhanced iris crop
//! records/{id}.json                    screening record
//! ```
//!
//! `ts` is the millisecond timestamp of the call and doubles as record id.
//! Gate outcomes store only the original.

// Pixel rectangles come from decoded images and fit in i32.
#![allow(clippy::cast_possible_wrap)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use leukoscan_core::domain::{EyeReport, EyeSide, PipelineResult, PixelRect};
use leukoscan_core::ports::{ResultStore, StoredRecord};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info};

const IRIS_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const FALLBACK_NAME: &str = "upload";

/// Record written to `records/{id}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningRecord {
    /// Millisecond timestamp id.
    pub id: u64,
    /// RFC 3339 creation time (UTC).
    pub created_at: String,
    /// Original image, relative to the store root.
    pub original: String,
    /// Left eye crop, relative to the store root.
    pub left_eye: Option<String>,
    /// Right eye crop, relative to the store root.
    pub right_eye: Option<String>,
    /// Left flag; `null` when indeterminate.
    pub has_leukocoria_left: Option<bool>,
    /// Right flag; `null` when indeterminate.
    pub has_leukocoria_right: Option<bool>,
}

/// [`ResultStore`] writing images and records below a directory.
pub struct FsResultStore {
    root: PathBuf,
}

impl FsResultStore {
    /// Creates a store rooted at `root`. Directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn write_eye(&self, ts: u64, name: &str, report: &EyeReport) -> Result<String> {
        let side = report.side();

        let mut crop = report.crop.image.to_rgb8();
        if let Some(iris) = report.iris {
            draw_box(&mut crop, iris.bounds);
        }
        let eye_rel = format!("two_eyes/{ts}_{side}_{}", with_writable_extension(name));
        save_image(&self.root.join(&eye_rel), &DynamicImage::ImageRgb8(crop))?;

        if let Some(enhanced) = &report.enhanced {
            let iris_rel = format!("iris_crops/{ts}_iris_{side}_{}.png", stem(name));
            save_image(
                &self.root.join(iris_rel),
                &DynamicImage::ImageRgb8(enhanced.image.clone()),
            )?;
        }

        Ok(eye_rel)
    }
}

impl ResultStore for FsResultStore {
    fn store(
        &self,
        original: &[u8],
        original_name: &str,
        result: &PipelineResult,
    ) -> Result<StoredRecord> {
        let now = OffsetDateTime::now_utc();
        let ts = millis(now);
        let name = sanitize(original_name);

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let original_rel = format!("{ts}_{name}");
        let original_path = self.root.join(&original_rel);
        fs::write(&original_path, original)
            .with_context(|| format!("Failed to write {}", original_path.display()))?;
        debug!("Stored original at {}", original_path.display());

        let Some(pair) = result.eyes() else {
            return Ok(StoredRecord {
                id: None,
                original: original_rel,
                left_eye: None,
                right_eye: None,
            });
        };

        let left_eye = self.write_eye(ts, &name, &pair.left)?;
        let right_eye = self.write_eye(ts, &name, &pair.right)?;

        let record = ScreeningRecord {
            id: ts,
            created_at: now
                .format(&Rfc3339)
                .context("Failed to format timestamp")?,
            original: original_rel.clone(),
            left_eye: Some(left_eye.clone()),
            right_eye: Some(right_eye.clone()),
            has_leukocoria_left: result.flag(EyeSide::Left),
            has_leukocoria_right: result.flag(EyeSide::Right),
        };

        let records_dir = self.root.join("records");
        fs::create_dir_all(&records_dir)
            .with_context(|| format!("Failed to create {}", records_dir.display()))?;
        let record_path = records_dir.join(format!("{ts}.json"));
        let json = serde_json::to_vec_pretty(&record).context("Failed to serialize record")?;
        fs::write(&record_path, json)
            .with_context(|| format!("Failed to write {}", record_path.display()))?;
        info!("Stored screening record {}", record_path.display());

        Ok(StoredRecord {
            id: Some(ts),
            original: original_rel,
            left_eye: Some(left_eye),
            right_eye: Some(right_eye),
        })
    }
}

/// Draws a 2 px rectangle along the inside of `bounds`.
fn draw_box(image: &mut RgbImage, bounds: PixelRect) {
    let (w, h) = (bounds.width(), bounds.height());
    draw_hollow_rect_mut(
        image,
        Rect::at(bounds.x1 as i32, bounds.y1 as i32).of_size(w, h),
        IRIS_BOX_COLOR,
    );
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(
            image,
            Rect::at(bounds.x1 as i32 + 1, bounds.y1 as i32 + 1).of_size(w - 2, h - 2),
            IRIS_BOX_COLOR,
        );
    }
}

fn save_image(path: &Path, image: &DynamicImage) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn millis(at: OffsetDateTime) -> u64 {
    (at.unix_timestamp_nanos() / 1_000_000).max(0) as u64
}

/// Keeps only the final path component and replaces anything unusual.
fn sanitize(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(FALLBACK_NAME)
}

/// Returns `name` if its extension is an encodable image format, else `name.png`.
fn with_writable_extension(name: &str) -> String {
    match ImageFormat::from_path(name) {
        Ok(format) if format.writing_enabled() => name.to_string(),
        _ => format!("{name}.png"),
    }
}
