use anyhow::Result;
use clap::Parser;
use edge_reader::cli::{Cli, Commands};
use edge_reader::config::AppConfig;
use edge_reader::models::ConnectionStatus;
use edge_reader::render;
use edge_reader::session::TelemetryView;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();
    let app_config = AppConfig::load()?;

    match cli.command {
        Commands::Url(args) => {
            let key = args.stream_key(app_config.stream.default_hz)?;
            println!("{}", key.stream_url(&app_config.api.base_url));
        }
        Commands::Watch { stream, dashboard } => {
            let key = stream.stream_key(app_config.stream.default_hz)?;
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                equipment_id = key.equipment_id(),
                "edge-reader starting"
            );
            watch(&app_config, key, dashboard).await?;
        }
    }

    Ok(())
}

async fn watch(
    app_config: &AppConfig,
    key: edge_reader::models::StreamKey,
    dashboard: bool,
) -> Result<()> {
    let parameters = key.parameter_keys().to_vec();
    let mut view = TelemetryView::new(app_config.settings_for(&key, dashboard));
    view.watch(key);
    let Some(session) = view.session() else {
        return Ok(());
    };
    tracing::info!(url = %session.url(), "watching telemetry stream");
    let mut updates = session.subscribe();

    let mut stats_tick = tokio::time::interval(Duration::from_secs(
        app_config.monitoring.stats_log_interval_secs,
    ));
    stats_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut last_status = updates.borrow().status;
    let mut last_applied = 0;

    tokio::select! {
        _ = async {
            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        if snapshot.status != last_status {
                            tracing::info!(status = snapshot.status.label(), "stream status");
                            last_status = snapshot.status;
                        }
                        if snapshot.frames_applied != last_applied {
                            last_applied = snapshot.frames_applied;
                            tracing::info!("{}", render::kpi_line(&snapshot.latest, &parameters));
                        }
                        if snapshot.status == ConnectionStatus::Closed {
                            break;
                        }
                    }
                    _ = stats_tick.tick() => {
                        let snapshot = updates.borrow().clone();
                        tracing::info!(
                            status = %snapshot.status,
                            frames_applied = snapshot.frames_applied,
                            frames_dropped = snapshot.frames_dropped,
                            buffered = snapshot.history.len(),
                            "stream stats"
                        );
                    }
                }
            }
        } => {
            tracing::info!("Telemetry stream closed by server");
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
    }

    view.close();
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
