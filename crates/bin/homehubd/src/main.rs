//! # homehubd — homehub daemon
//!
//! Composition root that wires the kernel, loads configured components,
//! and runs until asked to stop.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialise tracing
//! - Build the component registry and bootstrap engine
//! - Set up every configured component in dependency order
//! - Bridge SIGINT/SIGTERM to a hub shutdown request
//! - Exit with the code the hub reports (the restart code is interpreted
//!   by the external supervisor)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on every other crate. It is
//! the wiring layer — no kernel logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use homehub_component_demo::{DemoComponent, DemoLightPlatform};
use homehub_core::bootstrap::Bootstrapper;
use homehub_core::component::ComponentRegistry;
use homehub_core::hub::{Hub, HubConfig};

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let hub = Hub::new(HubConfig {
        initial_workers: config.hub.initial_workers,
        shutdown_grace: Duration::from_secs(config.hub.shutdown_grace_secs),
    });

    let mut registry = ComponentRegistry::new();
    if config
        .components
        .contains_key(homehub_component_demo::DOMAIN)
    {
        registry.register(Arc::new(DemoComponent));
        registry.register_platform(Arc::new(DemoLightPlatform));
    }

    let engine =
        Bootstrapper::new(registry).with_coordination_domain(config.hub.coordination_domain.clone());

    let configuration = config.component_configuration()?;
    let loaded = engine.setup_all(&hub, &configuration);
    info!(loaded, components = ?hub.components(), "hub bootstrapped");

    hub.start();

    // The hub parks a plain thread; signals arrive through tokio.
    let mut waiter = {
        let hub = Arc::clone(&hub);
        tokio::task::spawn_blocking(move || hub.block_till_stopped())
    };

    let exit_code = tokio::select! {
        () = shutdown_signal() => {
            info!("shutdown signal received");
            hub.request_shutdown(0);
            (&mut waiter).await?
        }
        code = &mut waiter => code?,
    };

    info!(exit_code, "homehub stopped");
    std::process::exit(exit_code);
}

/// Resolve when the process receives SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
