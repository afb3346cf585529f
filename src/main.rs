mod app;
mod backend;
mod chart;
mod config;
mod event;
mod export;
mod format;
mod session;
mod theme;
mod tier;
mod toolkit;

use app::AttendanceApp;
use backend::HttpQueryClient;
use chart::ChartRenderer;
use clap::Parser;
use config::AppConfig;
use eframe::egui;
use session::chat::ChatSession;
use std::path::PathBuf;
use std::sync::mpsc;
use theme::Theme;
use toolkit::{FrameClipboard, SystemClipboard, Toolkit};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "attendance-assistant", about = "Conversational attendance assistant")]
struct Args {
    /// Backend base URL; overrides the config file.
    #[arg(long)]
    endpoint: Option<String>,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deep link whose `q` parameter is submitted on startup.
    #[arg(long)]
    link: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("attendance_assistant=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let (mut config, warning) = AppConfig::load_or_default(args.config.as_deref());
    let mut warnings: Vec<String> = warning.into_iter().collect();
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
        if let Err(err) = config.validate() {
            warnings.push(err.to_string());
            config.endpoint = AppConfig::default().endpoint;
        }
    }

    let initial_query = args
        .link
        .as_deref()
        .and_then(|link| toolkit::url_param(link, "q"));

    let query_url = backend::query_url(&config.endpoint, &config.query_path)?;
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("attendance-runtime")
        .build()?;

    let client = runtime.block_on(async { HttpQueryClient::new(query_url, tx) })?;
    let endpoint_label = client.query_url().to_string();
    tracing::info!(url = %endpoint_label, "attendance backend configured");

    let frame_clipboard = FrameClipboard::default();
    let toolkit = Toolkit::new(
        config.toast_duration(),
        Box::new(SystemClipboard::default()),
        Box::new(frame_clipboard.clone()),
    );
    let session = ChatSession::new(&config, Box::new(client), toolkit, ChartRenderer::default());
    let app = AttendanceApp::new(
        rx,
        session,
        &config,
        frame_clipboard,
        endpoint_label,
        warnings,
        initial_query,
    );
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Attendance Assistant",
        native_options,
        Box::new(move |creation_context| {
            Theme::default().apply_visuals(&creation_context.egui_ctx);
            Ok(Box::new(app))
        }),
    )?;

    Ok(())
}
