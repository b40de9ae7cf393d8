mod app;
mod chat;
mod completion;
mod event;
mod settings;
mod table;
mod template;
mod theme;

use app::TabletalkApp;
use completion::CompletionClient;
use eframe::egui;
use settings::store::{default_settings_path, FileStore};
use std::sync::mpsc;
use theme::Theme;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn start_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    start_logging();

    let (store, warning) = FileStore::open(default_settings_path());
    info!(path = %store.path().display(), "settings loaded");
    let config = app::completion_config(&store);
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tabletalk-runtime")
        .build()?;

    let completion = runtime.block_on(async { CompletionClient::new(tx, config) })?;
    let theme = Theme::default();
    let app = TabletalkApp::new(rx, completion, store, theme.clone(), warning.into_iter().collect());
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Tabletalk")
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Tabletalk",
        native_options,
        Box::new(move |creation_context| {
            theme.apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
