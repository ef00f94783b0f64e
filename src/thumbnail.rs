use std::path::{Path, PathBuf};

use image::DynamicImage;

pub const THUMB_SIZE: u32 = 300;

pub static SUPPORTED_IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "webp", "bmp"];

/// Returns `true` if the path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    SUPPORTED_IMAGE_EXTS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
}

/// Returns the cached thumbnail path for a stored photo.
///
/// Photos of different customers share file names (`pkg-…`) only by
/// accident, but the parent directory is folded in anyway.
pub fn cache_path(source: &Path, cache_dir: &Path) -> PathBuf {
    let owner = source
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = source.file_name().unwrap_or_default().to_string_lossy();
    if owner.is_empty() {
        cache_dir.join(format!("{}.webp", stem))
    } else {
        cache_dir.join(format!("{}-{}.webp", owner, stem))
    }
}

pub fn open_image(path: &Path) -> anyhow::Result<DynamicImage> {
    Ok(image::open(path)?)
}

/// Generate a thumbnail for `source` and write it to `dest`.
pub fn generate(source: &Path, dest: &Path) -> anyhow::Result<DynamicImage> {
    let img = open_image(source)?;
    let thumb = img.thumbnail(THUMB_SIZE, THUMB_SIZE);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    thumb.save(dest)?;
    Ok(thumb)
}

/// Loads a cached thumbnail, generating it first when missing or stale.
pub fn load_or_generate(source: &Path, cache_dir: &Path) -> anyhow::Result<DynamicImage> {
    let dest = cache_path(source, cache_dir);
    if is_fresh(source, &dest) {
        if let Ok(img) = image::open(&dest) {
            return Ok(img);
        }
    }
    generate(source, &dest)
}

fn is_fresh(source: &Path, cached: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(source), modified(cached)) {
        (Some(src), Some(thumb)) => thumb >= src,
        _ => false,
    }
}
