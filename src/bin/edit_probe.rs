use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

#[path = "../capability.rs"]
mod capability;
#[path = "../codec.rs"]
mod codec;
#[path = "../config.rs"]
mod config;
#[path = "../error.rs"]
mod error;
#[path = "../history.rs"]
mod history;
#[path = "../session.rs"]
mod session;
#[path = "../sources.rs"]
mod sources;
#[path = "../thumbnail.rs"]
mod thumbnail;

use capability::HttpEditCapability;
use history::{HistoryEntry, ORIGINAL_LABEL};
use session::{EditCompletion, EditSession};
use sources::{ByteSource, FileSource};

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}

fn write_entry(out_dir: &Path, index: usize, entry: &HistoryEntry) -> Result<()> {
    let image_path = out_dir.join(format!(
        "{:02}-image.{}",
        index,
        extension_for(entry.image.mime())
    ));
    fs::write(&image_path, entry.image.bytes())
        .with_context(|| format!("write failed for {}", image_path.display()))?;
    if let Some(thumb) = &entry.thumbnail {
        let thumb_path = out_dir.join(format!("{:02}-thumb.jpg", index));
        fs::write(&thumb_path, &thumb.bytes)
            .with_context(|| format!("write failed for {}", thumb_path.display()))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let _bin = args.next();
    let image = args
        .next()
        .map(PathBuf::from)
        .context("usage: edit_probe <image> <instruction>...")?;
    let instructions: Vec<String> = args.collect();
    if instructions.is_empty() {
        anyhow::bail!("usage: edit_probe <image> <instruction>...");
    }

    let config = config::AppConfig::load();
    let endpoint = config.resolve_endpoint();
    let capability = HttpEditCapability::new(endpoint.clone(), config.request_timeout())
        .context("could not build HTTP client")?;
    let mut session = EditSession::with_thumbnail_max(Arc::new(capability), config.thumbnail_max());

    let source = FileSource
        .try_extract_image(image.clone())
        .with_context(|| format!("{} is not a readable image", image.display()))?;
    session
        .ingest_source(source, ORIGINAL_LABEL)
        .with_context(|| format!("ingest failed for {}", image.display()))?;
    eprintln!("Loaded {} ; sending edits to {}", image.display(), endpoint);

    for instruction in &instructions {
        let t0 = Instant::now();
        let outcome = session.submit_edit(instruction);
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(EditCompletion::Applied { index }) => {
                eprintln!("[{index}] {instruction:?} applied in {elapsed_ms:.0} ms");
            }
            Ok(EditCompletion::TextOnly) | Ok(EditCompletion::Stale) => {
                eprintln!("{instruction:?}: {}", session.last_message());
            }
            Err(err) => {
                eprintln!("{instruction:?} failed after {elapsed_ms:.0} ms: {err}");
            }
        }
    }

    let out_dir = std::env::temp_dir().join(format!(
        "thumbedit-probe-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    ));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("create_dir_all {}", out_dir.display()))?;

    for (index, entry) in session.entries().iter().enumerate() {
        write_entry(&out_dir, index, entry)?;
        println!(
            "HISTORY {index} {:?} {:?} {}x{} {}",
            entry.provenance,
            entry.instruction,
            entry.image.width(),
            entry.image.height(),
            entry.image.mime()
        );
    }
    println!("OUT_DIR {}", out_dir.display());

    Ok(())
}
