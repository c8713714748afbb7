//! Suscriptor de ubicación en vivo (estudiantes y padres)
//!
//! Se une a la sala de la ruta y sustituye la posición del bus con cada
//! `receive_location`. Las actualizaciones más viejas que la mostrada se
//! descartan: por `sentAt` cuando ambas lo traen, si no por `seq`. Sin ninguno
//! de los dos, gana el orden de llegada.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::location::{BusPosition, LocationBroadcast};
use crate::services::connection_manager::ConnectionManager;

pub const RECEIVE_LOCATION_EVENT: &str = "receive_location";

/// Edad de la última posición conocida
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Freshness {
    Live,
    Stale { age: Duration },
}

/// Posición actual del bus con control de frescura
#[derive(Debug, Default, Clone)]
pub struct TrackedBus {
    current: Option<BusPosition>,
}

impl TrackedBus {
    /// Aplicar una actualización; `false` si era más vieja que la actual
    pub fn apply(&mut self, broadcast: &LocationBroadcast, received_at: DateTime<Utc>) -> bool {
        if let Some(current) = &self.current {
            if is_outdated(broadcast, current) {
                return false;
            }
        }
        self.current = Some(BusPosition::from_broadcast(broadcast, received_at));
        true
    }

    pub fn position(&self) -> Option<&BusPosition> {
        self.current.as_ref()
    }

    /// `None` mientras no haya llegado ninguna posición
    pub fn freshness(&self, now: DateTime<Utc>, stale_after: Duration) -> Option<Freshness> {
        self.current.as_ref().map(|p| freshness_of(p, now, stale_after))
    }
}

pub fn freshness_of(position: &BusPosition, now: DateTime<Utc>, stale_after: Duration) -> Freshness {
    let age = (now - position.received_at).to_std().unwrap_or(Duration::ZERO);
    if age > stale_after {
        Freshness::Stale { age }
    } else {
        Freshness::Live
    }
}

fn is_outdated(incoming: &LocationBroadcast, current: &BusPosition) -> bool {
    if let (Some(new), Some(old)) = (incoming.sent_at, current.sent_at) {
        if new != old {
            return new < old;
        }
    }
    match (incoming.seq, current.seq) {
        (Some(new), Some(old)) => new <= old,
        _ => false,
    }
}

pub struct LocationSubscriber;

impl LocationSubscriber {
    /// Unirse a la ruta y seguir la posición del bus en segundo plano
    pub fn start(connection: Arc<ConnectionManager>, route_id: i64) -> SubscriptionHandle {
        // Suscribirse antes de unirse para no perder el primer evento
        let mut events = connection.subscribe();
        connection.join_route(route_id);
        info!("🚏 Siguiendo el bus de la ruta {}", route_id);

        let (position_tx, position_rx) = watch::channel(None);
        let accepted = Arc::new(AtomicU64::new(0));
        let discarded = Arc::new(AtomicU64::new(0));
        let accepted_counter = accepted.clone();
        let discarded_counter = discarded.clone();

        let task = tokio::spawn(async move {
            let mut tracked = TrackedBus::default();
            loop {
                match events.recv().await {
                    Ok(event) if event.name == RECEIVE_LOCATION_EVENT => {
                        let broadcast: LocationBroadcast = match serde_json::from_value(event.payload) {
                            Ok(b) => b,
                            Err(e) => {
                                warn!("⚠️ receive_location inválido: {}", e);
                                continue;
                            }
                        };
                        if tracked.apply(&broadcast, Utc::now()) {
                            accepted_counter.fetch_add(1, Ordering::Relaxed);
                            position_tx.send_replace(tracked.position().cloned());
                        } else {
                            discarded_counter.fetch_add(1, Ordering::Relaxed);
                            debug!("🗑️ Posición atrasada descartada (seq {:?})", broadcast.seq);
                        }
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ Suscriptor atrasado, {} eventos perdidos", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            // `connection` se mantiene vivo mientras la tarea siga
            drop(connection);
        });

        SubscriptionHandle {
            task: Some(task),
            position: position_rx,
            accepted,
            discarded,
        }
    }
}

/// Handle de la suscripción; al soltarlo deja de escuchar
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
    position: watch::Receiver<Option<BusPosition>>,
    accepted: Arc<AtomicU64>,
    discarded: Arc<AtomicU64>,
}

impl SubscriptionHandle {
    pub fn position(&self) -> Option<BusPosition> {
        self.position.borrow().clone()
    }

    /// Receptor que cambia una vez por cada posición aceptada
    pub fn updates(&self) -> watch::Receiver<Option<BusPosition>> {
        self.position.clone()
    }

    pub fn freshness(&self, now: DateTime<Utc>, stale_after: Duration) -> Option<Freshness> {
        self.position
            .borrow()
            .as_ref()
            .map(|p| freshness_of(p, now, stale_after))
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn broadcast(lat: f64, lng: f64, seq: Option<u64>, sent_secs: Option<i64>) -> LocationBroadcast {
        LocationBroadcast {
            lat,
            lng,
            bearing: None,
            seq,
            sent_at: sent_secs.map(|s| Utc.timestamp_opt(1_700_000_000 + s, 0).unwrap()),
        }
    }

    #[test]
    fn test_each_event_replaces_position_without_sequencing() {
        let mut bus = TrackedBus::default();
        assert!(bus.apply(&broadcast(17.40, 78.48, None, None), Utc::now()));
        assert_eq!(bus.position().unwrap().coordinates, [78.48, 17.40]);
        assert!(bus.apply(&broadcast(17.39, 78.47, None, None), Utc::now()));
        assert_eq!(bus.position().unwrap().coordinates, [78.47, 17.39]);
    }

    #[test]
    fn test_older_sequence_is_discarded() {
        let mut bus = TrackedBus::default();
        assert!(bus.apply(&broadcast(1.0, 1.0, Some(5), None), Utc::now()));
        assert!(!bus.apply(&broadcast(0.0, 0.0, Some(4), None), Utc::now()));
        assert!(!bus.apply(&broadcast(0.0, 0.0, Some(5), None), Utc::now()));
        assert!(bus.apply(&broadcast(2.0, 2.0, Some(6), None), Utc::now()));
        assert_eq!(bus.position().unwrap().coordinates, [2.0, 2.0]);
    }

    #[test]
    fn test_newer_timestamp_wins_after_publisher_restart() {
        let mut bus = TrackedBus::default();
        assert!(bus.apply(&broadcast(1.0, 1.0, Some(40), Some(10)), Utc::now()));
        // El conductor reinició la app: seq vuelve a 1 pero el envío es más reciente
        assert!(bus.apply(&broadcast(2.0, 2.0, Some(1), Some(20)), Utc::now()));
        assert!(!bus.apply(&broadcast(3.0, 3.0, Some(41), Some(15)), Utc::now()));
    }

    #[test]
    fn test_freshness_reports_age() {
        let mut bus = TrackedBus::default();
        let received = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(bus.freshness(received, Duration::from_secs(30)).is_none());

        bus.apply(&broadcast(1.0, 1.0, None, None), received);
        assert_eq!(
            bus.freshness(received + chrono::Duration::seconds(10), Duration::from_secs(30)),
            Some(Freshness::Live)
        );
        assert_eq!(
            bus.freshness(received + chrono::Duration::seconds(45), Duration::from_secs(30)),
            Some(Freshness::Stale { age: Duration::from_secs(45) })
        );
    }
}
