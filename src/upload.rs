use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::gallery::Item;
use crate::inbox::{InboxStore, PhotoKind};
use crate::metadata;
use crate::thumbnail;

const PHOTOS_DIR: &str = "photos";

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("{} is not a readable image: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("{} is not a supported image type", .0.display())]
    Unsupported(PathBuf),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// A photo that passed validation and is ready to be stored.
struct Accepted {
    bytes: Vec<u8>,
    extension: String,
    description: String,
}

fn accept(path: &Path) -> Result<Accepted, UploadError> {
    if !thumbnail::is_supported_image(path) {
        return Err(UploadError::Unsupported(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    image::load_from_memory(&bytes).map_err(|source| UploadError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    Ok(Accepted {
        bytes,
        extension,
        description: metadata::describe(path),
    })
}

/// Directory holding one customer's stored photos.
pub fn photos_dir(data_dir: &Path, customer_id: &str) -> PathBuf {
    data_dir.join(PHOTOS_DIR).join(customer_id)
}

/// Validates every path, then copies the photos under `data_dir` and appends
/// them to the customer's `kind` collection in order.
///
/// Nothing is copied or appended unless every path is a decodable image.
pub fn import_photos(
    store: &mut dyn InboxStore,
    data_dir: &Path,
    customer_id: &str,
    kind: PhotoKind,
    paths: &[PathBuf],
    now: DateTime<Utc>,
) -> Result<Vec<Item>, UploadError> {
    let accepted = paths
        .par_iter()
        .map(|path| accept(path))
        .collect::<Result<Vec<_>, _>>()?;

    let dest_dir = photos_dir(data_dir, customer_id);
    std::fs::create_dir_all(&dest_dir)
        .with_context(|| format!("creating {}", dest_dir.display()))?;

    let existing = store.inbox(customer_id).photos(kind).len();
    let mut photos = Vec::with_capacity(accepted.len());
    for (n, photo) in accepted.into_iter().enumerate() {
        let id = format!(
            "{}-{}-{}",
            kind.id_prefix(),
            now.timestamp_millis(),
            existing + n + 1
        );
        let dest = dest_dir.join(format!("{}.{}", id, photo.extension));
        std::fs::write(&dest, &photo.bytes)
            .with_context(|| format!("writing {}", dest.display()))?;
        photos.push(Item::new(
            id,
            dest.to_string_lossy().into_owned(),
            photo.description,
        ));
    }

    store.append_photos(customer_id, kind, photos.clone())?;
    info!(
        customer = customer_id,
        kind = kind.label(),
        count = photos.len(),
        "imported photos"
    );
    Ok(photos)
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgb};

    use super::*;
    use crate::inbox::MemoryInboxStore;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        ImageBuffer::from_pixel(4, 3, Rgb([200u8, 100, 50]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn imports_copy_files_and_append_in_order() {
        let src = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let paths = vec![png(src.path(), "front.png"), png(src.path(), "back.PNG")];
        let mut store = MemoryInboxStore::default();

        let photos = import_photos(
            &mut store,
            data.path(),
            "user-1",
            PhotoKind::Packages,
            &paths,
            now(),
        )
        .unwrap();

        let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["pkg-1760000000000-1", "pkg-1760000000000-2"]);
        assert_eq!(photos[0].description, "front.png");
        assert!(photos[1].image_source.ends_with("pkg-1760000000000-2.png"));
        assert!(Path::new(&photos[0].image_source).exists());
        assert_eq!(store.inbox("user-1").packages, photos);

        let more = import_photos(
            &mut store,
            data.path(),
            "user-1",
            PhotoKind::Packages,
            &[png(src.path(), "third.png")],
            now(),
        )
        .unwrap();
        assert_eq!(more[0].id, "pkg-1760000000000-3");
    }

    #[test]
    fn one_bad_file_aborts_the_batch() {
        let src = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let broken = src.path().join("broken.jpg");
        std::fs::write(&broken, b"definitely not a jpeg").unwrap();
        let paths = vec![png(src.path(), "ok.png"), broken];
        let mut store = MemoryInboxStore::default();

        let err = import_photos(
            &mut store,
            data.path(),
            "user-1",
            PhotoKind::Letters,
            &paths,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::Decode { .. }));
        assert!(store.inbox("user-1").letters.is_empty());
        assert!(!photos_dir(data.path(), "user-1").exists());
    }

    #[test]
    fn unsupported_and_missing_files_are_reported() {
        let data = tempfile::tempdir().unwrap();
        let mut store = MemoryInboxStore::default();

        let err = import_photos(
            &mut store,
            data.path(),
            "user-1",
            PhotoKind::Letters,
            &[PathBuf::from("notes.txt")],
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::Unsupported(_)));

        let err = import_photos(
            &mut store,
            data.path(),
            "user-1",
            PhotoKind::Letters,
            &[PathBuf::from("/nonexistent/letter.jpg")],
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, UploadError::Read { .. }));
    }
}
