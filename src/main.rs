use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use school_bus_tracker::clients::{HttpTransportApi, SocketIoTransport};
use school_bus_tracker::config::EnvironmentConfig;
use school_bus_tracker::controllers::route_editor_controller::RouteEditorController;
use school_bus_tracker::controllers::routes_screen_controller::RoutesScreen;
use school_bus_tracker::models::role::UserRole;
use school_bus_tracker::services::{BackoffPolicy, Freshness, ReplayLocationSource, RoadPathService, WatchOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging (RUST_LOG, por defecto info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EnvironmentConfig::from_env()?;

    info!("🚌 School Bus Tracker");
    info!("=====================");
    info!("   Entorno: {}", config.environment);
    info!("   Backend: {}", config.api_base_url);
    info!("   Socket:  {}", config.socket_url);
    info!("   OSRM:    {}", config.osrm_base_url);
    info!("   Rol:     {:?}", config.tracker_role);
    if config.map_tile_api_key.is_none() {
        warn!("⚠️ MAP_TILE_API_KEY no configurada: los tiles del mapa no cargarán");
    }

    let api = Arc::new(HttpTransportApi::from_config(&config)?);
    let roads = Arc::new(RoadPathService::from_config(&config)?);

    if config.tracker_role == UserRole::Admin {
        let mut editor = RouteEditorController::new(api, roads);
        editor.load_routes().await?;
        for route in editor.routes() {
            info!(
                "🗺️ {} · bus {} · conductor {}",
                route.route_name,
                route.bus_label(),
                route.driver_label()
            );
        }
        return Ok(());
    }

    let screen = RoutesScreen::new(
        api,
        roads,
        Arc::new(SocketIoTransport::new(config.socket_url.clone())),
        BackoffPolicy::from_config(&config),
    );

    match config.tracker_role {
        UserRole::Driver => run_driver(&screen, &config).await?,
        role => run_viewer(&screen, &config, role).await?,
    }

    info!("👋 Bus tracker terminado");
    Ok(())
}

/// Publicar una grabación de GPS como si fuera el dispositivo del conductor
async fn run_driver(screen: &RoutesScreen, config: &EnvironmentConfig) -> Result<()> {
    let path = config
        .gps_replay_file
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GPS_REPLAY_FILE es obligatorio para TRACKER_ROLE=driver"))?;
    let options = WatchOptions::from_config(config);
    let source = ReplayLocationSource::from_file(path)
        .await?
        .with_pace(options.interval);
    info!("🛰️ {} lecturas de GPS en {}", source.len(), path);

    let mut session = screen
        .mount_driver(&source, options, Utc::now().date_naive())
        .await?;

    tokio::select! {
        published = session.finish_watch() => {
            info!("✅ Grabación terminada, {} ubicaciones publicadas", published);
        }
        _ = shutdown_signal() => {}
    }

    session.unmount().await;
    Ok(())
}

/// Seguir el bus y registrar cada posición nueva
async fn run_viewer(screen: &RoutesScreen, config: &EnvironmentConfig, role: UserRole) -> Result<()> {
    let session = screen
        .mount_viewer(role, config.route_id, config.position_stale_after())
        .await?;
    info!("🚏 Siguiendo la ruta {} ({} paradas)", session.route_id(), session.stops().len());

    let mut updates = match session.subscription() {
        Some(subscription) => subscription.updates(),
        None => return Ok(()),
    };
    let mut stale_check = tokio::time::interval(config.position_stale_after().max(Duration::from_secs(1)));

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    error!("❌ El suscriptor terminó inesperadamente");
                    break;
                }
                let position = updates.borrow_and_update().clone();
                if let Some(position) = position {
                    info!(
                        "📍 Bus en ({:.5}, {:.5}) rumbo {:?}",
                        position.latitude(),
                        position.longitude(),
                        position.heading
                    );
                }
            }
            _ = stale_check.tick() => {
                if let Some(Freshness::Stale { age }) = session.freshness() {
                    warn!("⏱️ Sin posición nueva desde hace {:?} ({:?})", age, session.connection_state());
                }
            }
            _ = &mut shutdown => break,
        }
    }

    session.unmount().await;
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, cerrando sesión...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, cerrando sesión...");
        },
    }
}
