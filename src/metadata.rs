use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct PhotoMetadata {
    pub camera_model: Option<String>,
    pub date_taken: Option<String>,
}

pub fn read(path: &Path) -> anyhow::Result<PhotoMetadata> {
    let file = std::fs::File::open(path)?;
    let mut bufreader = std::io::BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader)?;

    let field = |tag| {
        exif.get_field(tag, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string())
    };

    Ok(PhotoMetadata {
        camera_model: field(exif::Tag::Model),
        date_taken: field(exif::Tag::DateTimeOriginal).or_else(|| field(exif::Tag::DateTime)),
    })
}

/// Caption for an imported photo: when it was taken if the file says so,
/// otherwise its file name.
pub fn describe(path: &Path) -> String {
    if let Ok(PhotoMetadata {
        date_taken: Some(date),
        ..
    }) = read(path)
    {
        return format!("Photographed {date}");
    }
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
