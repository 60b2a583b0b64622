use std::io::Cursor;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::error::Result;

const MARGIN: i64 = 24;

/// Composite the brand watermark onto the bottom-right corner of a generated
/// cover. Returns PNG bytes. A missing watermark file passes the cover
/// through unmodified.
pub fn apply_watermark(cover_bytes: &[u8], watermark_path: Option<&Path>) -> Result<Vec<u8>> {
    let mut cover = image::load_from_memory(cover_bytes)?;

    if let Some(path) = watermark_path.filter(|p| p.exists()) {
        let watermark = image::open(path)?;
        stamp(&mut cover, &watermark);
    }

    let mut out = Vec::new();
    cover.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

fn stamp(cover: &mut DynamicImage, watermark: &DynamicImage) {
    // Scale the mark to a sixth of the cover width, keeping aspect ratio.
    let target_w = (cover.width() / 6).max(1);
    let target_h = ((watermark.height() as f64 / watermark.width() as f64) * target_w as f64)
        .round()
        .max(1.0) as u32;
    let scaled = watermark.resize(target_w, target_h, FilterType::Lanczos3);

    let x = cover.width() as i64 - scaled.width() as i64 - MARGIN;
    let y = cover.height() as i64 - scaled.height() as i64 - MARGIN;
    image::imageops::overlay(cover, &scaled, x.max(0), y.max(0));
}
