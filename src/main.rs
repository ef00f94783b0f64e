mod actions;
mod app;
mod auth;
mod browser;
mod config;
mod gallery;
mod inbox;
mod metadata;
mod thumbnail;
mod upload;
mod viewer;

use app::MailroomApp;
use config::AppConfig;

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let width = config.window_width.unwrap_or(1200.0);
    let height = config.window_height.unwrap_or(800.0);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Mailroom")
            .with_app_id("mailroom")
            .with_inner_size([width, height]),
        ..Default::default()
    };

    eframe::run_native(
        "mailroom",
        native_options,
        Box::new(|cc| Ok(Box::new(MailroomApp::new(cc, config)))),
    )
}
