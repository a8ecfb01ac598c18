mod app;
mod application;
mod config;
mod domain;
mod download_service;
mod ui;
mod utils;

use std::path::Path;

use iced::window;
use tracing::{info, warn};

use config::{AppConfig, DEFAULT_CONFIG_FILE};

fn main() -> iced::Result {
    let loaded = AppConfig::load(Path::new(DEFAULT_CONFIG_FILE));
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AppConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    if let Err(e) = loaded {
        warn!("{}; using defaults", e);
    }
    info!(
        "Storage directory {}, {} URLs",
        config.storage_dir.display(),
        config.urls.len()
    );

    iced::application(
        move || app::DownloadApp::new(config.clone()),
        app::update,
        app::view,
    )
    .title("Media Batch Player")
    .subscription(app::subscription)
    .window(window::Settings {
        exit_on_close_request: false,
        ..Default::default()
    })
    .run()
}
