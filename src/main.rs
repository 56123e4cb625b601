use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use vpn_agent::*;

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

    let app_config = config::AgentConfig::load()?;

    let iface = match app_config.monitoring.iface.clone() {
        Some(iface) => iface,
        None => counters::detect_default_iface().await.unwrap_or_else(|| {
            tracing::warn!("could not detect default interface; link rates will be zero");
            String::new()
        }),
    };

    let sampler = Arc::new(counters::CounterSampler::new(iface));
    let prober = Arc::new(latency::LatencyProbe::new(
        app_config.monitoring.ping_target.clone(),
        app_config.monitoring.ping_count,
        app_config.monitoring.ping_deadline_secs,
    ));
    let client = Arc::new(control_client::ControlClient::new(
        &app_config.control_base_url(),
        &app_config.control.token,
        &app_config.control.server_id,
    )?);
    let mutator = Arc::new(mutator::ConfigMutator::new(
        &app_config.proxy.config_path,
        app_config.proxy.protocol.clone(),
        mutator::ProxyService::Systemd {
            unit: app_config.proxy.service.clone(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let loop_handle = agent_loop::spawn(
        agent_loop::LoopDeps {
            sampler: sampler.clone(),
            prober,
            client,
            mutator: mutator.clone(),
        },
        agent_loop::LoopConfig {
            heartbeat_interval_secs: app_config.monitoring.heartbeat_interval_secs,
            proxy_port: app_config.proxy.port,
        },
        shutdown_rx,
    );

    tracing::info!(
        server_id = %app_config.control.server_id,
        interval_secs = app_config.monitoring.heartbeat_interval_secs,
        iface = %sampler.iface(),
        "agent loop started"
    );

    let app = routes::app(mutator, app_config.control.token.clone());
    let addr = format!("{}:{}", app_config.listener.host, app_config.listener.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Push listener on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
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
        } => {
            // In-flight heartbeat or ack delivery is safely lost here.
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            let _ = loop_handle.await;
        }
    }

    Ok(())
}
