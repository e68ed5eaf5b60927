//! Startup entry point.
//!
//! # Responsibility
//! - Wire configuration, logging, the note database and the asset store.
//! - Offer a few commands for local smoke checks without an HTTP layer.
//!
//! Usage: `knote [list | publish <text> | upload <path> [description]]`

use knote_core::{
    AppConfig, AssetStore, PublishRequest, PublishService, SqliteNoteRepository, UploadedFile,
};
use log::info;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run(std::env::args().skip(1).collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("knote: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    knote_core::init_logging(&config.log_level, &config.log_dir)?;

    let notes = SqliteNoteRepository::open(&config.db_path)?;
    // Blocks until the backend is reachable when reconnection is enabled.
    let assets = AssetStore::initialize(&config.store)?;
    info!(
        "event=startup module=cli status=ok backend={} db_path={}",
        assets.backend_name(),
        config.db_path.display()
    );
    let service = PublishService::new(notes, assets);

    match args.first().map(String::as_str) {
        None => {
            println!("knote_core ping={}", knote_core::ping());
            println!("knote_core version={}", knote_core::core_version());
            println!("asset backend={}", service.assets().backend_name());
        }
        Some("list") => {
            for note in service.index()? {
                println!("{} {}", note.id, note.content.trim_end());
            }
        }
        Some("publish") => {
            let outcome = service.handle(PublishRequest::publish(args[1..].join(" ")))?;
            match outcome.created_note {
                Some(note) => println!("published {}", note.id),
                None => println!("nothing to publish"),
            }
        }
        Some("upload") => {
            let path = args.get(1).ok_or("upload requires a file path")?;
            let file = read_upload(Path::new(path))?;
            let description = args.get(2..).map(|rest| rest.join(" ")).unwrap_or_default();
            let outcome = service.handle(PublishRequest::upload(description, file))?;
            println!("{}", outcome.description);
        }
        Some(other) => return Err(format!("unknown command `{other}`").into()),
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadedFile, Box<dyn Error>> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let content_type = knote_core::asset::content_type_for_identifier(&filename).to_string();
    Ok(UploadedFile {
        bytes,
        filename,
        content_type,
    })
}
