//! Publicador de ubicación del conductor
//!
//! Observa el GPS del dispositivo y emite `driver_location_update` por el
//! canal de la sesión, etiquetado con la ruta. Sin lotes ni confirmación:
//! como mucho una emisión por lectura aceptada.

use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::EnvironmentConfig;
use crate::models::location::{DriverLocationUpdate, GpsFix};
use crate::services::connection_manager::ConnectionManager;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo::{haversine_distance_m, initial_bearing_deg};

pub const DRIVER_LOCATION_EVENT: &str = "driver_location_update";

/// Opciones del watch de GPS
#[derive(Debug, Clone, PartialEq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    pub distance_filter_m: f64,
    pub interval: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            distance_filter_m: 10.0,
            interval: Duration::from_secs(3),
        }
    }
}

impl WatchOptions {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            distance_filter_m: config.location_distance_filter_m,
            interval: Duration::from_secs(config.location_interval_secs),
            ..Self::default()
        }
    }
}

/// Fuente de lecturas de GPS
pub trait LocationSource: Send + Sync {
    fn watch(&self, options: &WatchOptions) -> AppResult<mpsc::Receiver<GpsFix>>;
}

/// Reproduce lecturas grabadas (una `GpsFix` JSON por línea)
pub struct ReplayLocationSource {
    fixes: Vec<GpsFix>,
    pace: Option<Duration>,
}

impl ReplayLocationSource {
    pub fn new(fixes: Vec<GpsFix>) -> Self {
        Self { fixes, pace: None }
    }

    pub fn from_json_lines(text: &str) -> AppResult<Self> {
        let fixes = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(serde_json::from_str::<GpsFix>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(fixes))
    }

    pub async fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_lines(&text)
    }

    /// Pausa entre lecturas; por defecto se entregan sin esperar
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }
}

impl LocationSource for ReplayLocationSource {
    fn watch(&self, _options: &WatchOptions) -> AppResult<mpsc::Receiver<GpsFix>> {
        let (tx, rx) = mpsc::channel(16);
        let fixes = self.fixes.clone();
        let pace = self.pace;

        tokio::spawn(async move {
            for fix in fixes {
                if tx.send(fix).await.is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
            }
        });

        Ok(rx)
    }
}

/// Filtro de distancia mínima e intervalo mínimo entre reportes
#[derive(Debug, Clone)]
pub struct ReportThrottle {
    min_distance_m: f64,
    min_interval: Duration,
    last: Option<GpsFix>,
}

impl ReportThrottle {
    pub fn new(options: &WatchOptions) -> Self {
        Self {
            min_distance_m: options.distance_filter_m,
            min_interval: options.interval,
            last: None,
        }
    }

    /// Si la lectura debe reportarse, devuelve el rumbo a publicar
    ///
    /// La primera lectura siempre se reporta. Después hace falta haberse
    /// movido `min_distance_m` y que hayan pasado `min_interval` (hora GPS).
    pub fn accept(&mut self, fix: &GpsFix) -> Option<f64> {
        let heading = fix.heading.filter(|h| h.is_finite() && *h >= 0.0);
        let bearing = match &self.last {
            None => heading.unwrap_or(0.0),
            Some(last) => {
                let moved = haversine_distance_m(last.latitude, last.longitude, fix.latitude, fix.longitude);
                let elapsed = (fix.timestamp - last.timestamp).to_std().unwrap_or(Duration::ZERO);
                if moved < self.min_distance_m || elapsed < self.min_interval {
                    return None;
                }
                heading.unwrap_or_else(|| initial_bearing_deg(last.latitude, last.longitude, fix.latitude, fix.longitude))
            }
        };

        self.last = Some(fix.clone());
        Some(bearing)
    }
}

/// Construye las actualizaciones con número de secuencia monótono
pub struct LocationPublisher {
    route_id: i64,
    throttle: ReportThrottle,
    seq: u64,
}

impl LocationPublisher {
    pub fn new(route_id: i64, options: &WatchOptions) -> Self {
        Self {
            route_id,
            throttle: ReportThrottle::new(options),
            seq: 0,
        }
    }

    /// Actualización a emitir para esta lectura, si pasa el filtro
    pub fn next_update(&mut self, fix: &GpsFix) -> Option<DriverLocationUpdate> {
        let bearing = self.throttle.accept(fix)?;
        self.seq += 1;
        Some(DriverLocationUpdate {
            route_id: self.route_id,
            lat: fix.latitude,
            lng: fix.longitude,
            bearing,
            seq: self.seq,
            sent_at: Utc::now(),
        })
    }

    /// Arrancar el watch de GPS y publicar en segundo plano
    pub fn start(
        connection: Arc<ConnectionManager>,
        source: &dyn LocationSource,
        route_id: i64,
        options: WatchOptions,
    ) -> AppResult<PublisherHandle> {
        let mut fixes = source.watch(&options)?;
        let mut publisher = LocationPublisher::new(route_id, &options);
        let published = Arc::new(AtomicU64::new(0));
        let (device_tx, device_rx) = watch::channel(None);

        log::info!(
            "🛰️ Publicando ubicación de la ruta {} (filtro {} m / {:?})",
            route_id,
            options.distance_filter_m,
            options.interval
        );

        let counter = published.clone();
        let task = tokio::spawn(async move {
            while let Some(fix) = fixes.recv().await {
                device_tx.send_replace(Some(fix.clone()));

                let Some(update) = publisher.next_update(&fix) else {
                    continue;
                };
                match serde_json::to_value(&update) {
                    Ok(payload) => {
                        connection.emit(DRIVER_LOCATION_EVENT, payload);
                        counter.fetch_add(1, Ordering::Relaxed);
                        log::debug!("📡 Ubicación #{} emitida ({}, {})", update.seq, update.lat, update.lng);
                    }
                    Err(e) => log::error!("❌ Error serializando ubicación: {}", AppError::from(e)),
                }
            }
            log::info!("🛰️ Watch de GPS terminado para la ruta {}", route_id);
        });

        Ok(PublisherHandle {
            task: Some(task),
            published,
            device: device_rx,
        })
    }
}

/// Handle del publicador; al soltarlo se detiene el watch de GPS
pub struct PublisherHandle {
    task: Option<JoinHandle<()>>,
    published: Arc<AtomicU64>,
    device: watch::Receiver<Option<GpsFix>>,
}

impl PublisherHandle {
    /// Número de actualizaciones emitidas
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Última lectura del dispositivo (la cámara del conductor la sigue)
    pub fn device_location(&self) -> Option<GpsFix> {
        self.device.borrow().clone()
    }

    /// Receptor de las lecturas; conserva la última tras terminar el watch
    pub fn device_updates(&self) -> watch::Receiver<Option<GpsFix>> {
        self.device.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Esperar a que la fuente termine (útil con fuentes grabadas)
    pub async fn finished(mut self) -> u64 {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.published()
    }
}

impl Drop for PublisherHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
