//! Haajar Kiosk - Main Entry Point
//!
//! Opens the attendance store, restores the last active session and runs the
//! capture loop on its own thread behind the kiosk window.

use anyhow::{anyhow, Context};
use haajar_kiosk::{
    capture::source_from_config,
    config::{self, AppState, KioskConfig, LOG_FILE},
    AttendanceStore, KioskApp, KioskBackend, SessionInfo,
};
use std::sync::atomic::Ordering;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match config::ensure_app_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("Log file disabled: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,haajar_kiosk=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Last session if it still exists, else the first active one
async fn pick_session(store: &AttendanceStore, app_state: &AppState) -> anyhow::Result<SessionInfo> {
    if let Some(id) = app_state.last_session_id {
        match store.load_session(id).await {
            Ok(session) => return Ok(session),
            Err(e) => tracing::warn!(session_id = id, "Last session unavailable: {}", e),
        }
    }

    store
        .list_active_sessions()
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No active session found. Create a session before opening the kiosk."))
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();
    tracing::info!("Starting Haajar kiosk");

    let config = KioskConfig::load_or_default();
    let mut app_state = AppState::load_or_default();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("kiosk-store")
        .build()
        .context("Failed to start async runtime")?;

    let store = runtime
        .block_on(AttendanceStore::connect(&config.store))
        .context("Failed to open attendance store")?;
    let session = runtime.block_on(pick_session(&store, &app_state))?;
    tracing::info!(session_id = session.id, "Opening session: {}", session.headline());
    app_state.last_session_id = Some(session.id);

    let source = source_from_config(&config.camera);
    let (backend, handle) = KioskBackend::new(
        config.clone(),
        store,
        runtime.handle().clone(),
        source,
        session,
    );
    let running = backend.stop_handle();
    let backend_thread = std::thread::Builder::new()
        .name("kiosk-capture".into())
        .spawn(move || backend.run())
        .context("Failed to spawn capture thread")?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_title(config.ui.kiosk_title.clone()),
        ..Default::default()
    };

    let dark_mode = config.ui.dark_mode;
    let title = config.ui.kiosk_title.clone();
    let result = eframe::run_native(
        &title,
        native_options,
        Box::new(move |cc| {
            if dark_mode {
                cc.egui_ctx.set_visuals(egui::Visuals::dark());
            } else {
                cc.egui_ctx.set_visuals(egui::Visuals::light());
            }
            Ok(Box::new(KioskApp::new(cc, handle, config, app_state)))
        }),
    );

    tracing::info!("Shutting down...");
    running.store(false, Ordering::SeqCst);
    if backend_thread.join().is_err() {
        tracing::error!("Capture thread panicked");
    }

    result.map_err(|e| anyhow!("Display failed: {}", e))
}
