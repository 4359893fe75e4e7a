mod app;
mod browser;
mod capability;
mod codec;
mod config;
mod error;
mod history;
mod session;
mod sources;
mod thumbnail;
mod viewer;

use std::sync::Arc;

use app::EditorApp;
use capability::HttpEditCapability;
use config::AppConfig;

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let endpoint = config.resolve_endpoint();
    let capability = match HttpEditCapability::new(endpoint.clone(), config.request_timeout()) {
        Ok(capability) => capability,
        Err(err) => {
            eprintln!("thumbedit: could not set up HTTP client: {err}");
            std::process::exit(2);
        }
    };
    tracing::info!(
        endpoint = capability.endpoint(),
        timeout_secs = config.request_timeout().as_secs(),
        "edit service configured"
    );

    let width = config.window_width.unwrap_or(1100.0);
    let height = config.window_height.unwrap_or(820.0);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Thumbnail Editor")
            .with_app_id("thumbedit")
            .with_drag_and_drop(true)
            .with_inner_size([width, height]),
        ..Default::default()
    };

    eframe::run_native(
        "thumbedit",
        native_options,
        Box::new(|cc| Ok(Box::new(EditorApp::new(cc, config, Arc::new(capability))))),
    )
}
