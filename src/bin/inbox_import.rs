use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

#[path = "../config.rs"]
mod config;
#[path = "../gallery/mod.rs"]
mod gallery;
#[path = "../inbox.rs"]
mod inbox;
#[path = "../metadata.rs"]
mod metadata;
#[path = "../thumbnail.rs"]
mod thumbnail;
#[path = "../upload.rs"]
mod upload;

use config::AppConfig;
use inbox::{InboxStore, JsonInboxStore, PhotoKind};

const USAGE: &str = "usage: inbox_import <customer-id> <packages|letters> <photo>...";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let _bin = args.next();
    let customer_id = args.next().context(USAGE)?;
    let kind = args
        .next()
        .as_deref()
        .and_then(PhotoKind::parse)
        .context(USAGE)?;
    let paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if paths.is_empty() {
        anyhow::bail!(USAGE);
    }

    let config = AppConfig::load();
    let data_dir = config.data_dir();
    let mut store = JsonInboxStore::new(&data_dir).with_default_deadline(config.default_deadline());

    let photos = upload::import_photos(&mut store, &data_dir, &customer_id, kind, &paths, Utc::now())
        .with_context(|| format!("importing {} for {}", kind.label().to_lowercase(), customer_id))?;
    for photo in &photos {
        println!("{}\t{}\t{}", photo.id, photo.image_source, photo.description);
    }

    let inbox = store.inbox(&customer_id);
    eprintln!(
        "{} now has {} package photo(s) and {} letter(s) in {}",
        customer_id,
        inbox.packages.len(),
        inbox.letters.len(),
        store.path().display()
    );
    Ok(())
}
