//! Pantalla de rutas para conductores y pasajeros
//!
//! Montar una sesión carga la ruta asignada y sus paradas, resuelve el
//! trazado y arranca el canal en vivo: el conductor publica su posición,
//! estudiantes y padres la siguen. Soltar la sesión libera el watch de GPS
//! y el listener del socket.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::clients::socket_transport::SocketTransport;
use crate::clients::transport_api_client::TransportApi;
use crate::controllers::attendance_controller::AttendanceCollector;
use crate::controllers::map_composer::{self, MapScene, MarkerAction};
use crate::models::location::{BusPosition, GpsFix, LatLng};
use crate::models::role::UserRole;
use crate::models::route::Route;
use crate::models::stop::{sort_by_order, Stop};
use crate::services::connection_manager::{BackoffPolicy, ConnectionManager, ConnectionState};
use crate::services::location_publisher::{LocationPublisher, LocationSource, PublisherHandle, WatchOptions};
use crate::services::location_subscriber::{Freshness, LocationSubscriber, SubscriptionHandle};
use crate::services::road_path_service::RoadPathResolver;
use crate::utils::errors::{invalid_state_error, AppResult};

/// Dependencias comunes de las sesiones
#[derive(Clone)]
pub struct RoutesScreen {
    api: Arc<dyn TransportApi>,
    roads: Arc<dyn RoadPathResolver>,
    transport: Arc<dyn SocketTransport>,
    backoff: BackoffPolicy,
}

struct LoadedRoute {
    stops: Vec<Stop>,
    road_path: Vec<LatLng>,
}

impl RoutesScreen {
    pub fn new(
        api: Arc<dyn TransportApi>,
        roads: Arc<dyn RoadPathResolver>,
        transport: Arc<dyn SocketTransport>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            api,
            roads,
            transport,
            backoff,
        }
    }

    async fn load_route(&self, route_id: i64) -> AppResult<LoadedRoute> {
        let mut stops = self.api.list_stops(route_id).await?;
        sort_by_order(&mut stops);
        let road_path = self.roads.get_road_path(&stops).await;
        Ok(LoadedRoute { stops, road_path })
    }

    /// Sesión del conductor: publica su ubicación y toma asistencia
    pub async fn mount_driver(
        &self,
        source: &dyn LocationSource,
        options: WatchOptions,
        date: NaiveDate,
    ) -> AppResult<DriverSession> {
        let route = self.api.driver_route().await?;
        let loaded = self.load_route(route.id).await?;

        let connection = Arc::new(ConnectionManager::start(self.transport.clone(), self.backoff.clone()));
        let publisher = LocationPublisher::start(connection.clone(), source, route.id, options)?;
        let attendance = AttendanceCollector::new(self.api.clone(), route.id, date);

        log::info!(
            "🚌 Conductor en la ruta {} ({}), {} paradas",
            route.id,
            route.route_name,
            loaded.stops.len()
        );

        Ok(DriverSession {
            route,
            stops: loaded.stops,
            road_path: loaded.road_path,
            attendance,
            publisher: Some(publisher),
            last_device: None,
            connection: Some(connection),
        })
    }

    /// Sesión de estudiante o padre: sigue el bus de la ruta
    ///
    /// Con `route_id` se sigue esa ruta; si no, la asignada al usuario.
    pub async fn mount_viewer(
        &self,
        role: UserRole,
        route_id: Option<i64>,
        stale_after: Duration,
    ) -> AppResult<ViewerSession> {
        if !role.is_viewer() {
            return Err(invalid_state_error("Only students and parents can follow a bus"));
        }

        let (route_id, route) = match route_id {
            Some(id) => (id, None),
            None => {
                let route = self.api.rider_route().await?;
                (route.id, Some(route))
            }
        };
        let loaded = self.load_route(route_id).await?;

        let connection = Arc::new(ConnectionManager::start(self.transport.clone(), self.backoff.clone()));
        let subscription = LocationSubscriber::start(connection.clone(), route_id);

        Ok(ViewerSession {
            role,
            route_id,
            route,
            stops: loaded.stops,
            road_path: loaded.road_path,
            stale_after,
            subscription: Some(subscription),
            connection: Some(connection),
        })
    }
}

async fn release(connection: Option<Arc<ConnectionManager>>) {
    if let Some(connection) = connection {
        connection.close().await;
    }
}

pub struct DriverSession {
    route: Route,
    stops: Vec<Stop>,
    road_path: Vec<LatLng>,
    attendance: AttendanceCollector,
    publisher: Option<PublisherHandle>,
    last_device: Option<GpsFix>,
    connection: Option<Arc<ConnectionManager>>,
}

impl DriverSession {
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn attendance(&self) -> &AttendanceCollector {
        &self.attendance
    }

    pub fn attendance_mut(&mut self) -> &mut AttendanceCollector {
        &mut self.attendance
    }

    pub fn published(&self) -> u64 {
        self.publisher.as_ref().map_or(0, |p| p.published())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.current_state())
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionManager>> {
        self.connection.as_ref()
    }

    /// Escena actual; la cámara sigue la última lectura del dispositivo
    pub fn scene(&self) -> MapScene {
        let device = self
            .publisher
            .as_ref()
            .and_then(|p| p.device_location())
            .or_else(|| self.last_device.clone());
        map_composer::compose(UserRole::Driver, &self.stops, &self.road_path, None, device.as_ref())
    }

    /// Tocar una parada abre su lista de asistencia
    pub async fn marker_tap(&mut self, stop_id: i64) -> AppResult<()> {
        match map_composer::marker_action(UserRole::Driver, stop_id) {
            MarkerAction::OpenAttendance { stop_id } => self.attendance.select_stop(stop_id).await,
            _ => Ok(()),
        }
    }

    /// Esperar a que la fuente de GPS se agote y devolver lo publicado
    pub async fn finish_watch(&mut self) -> u64 {
        let Some(publisher) = self.publisher.take() else {
            return 0;
        };
        let device = publisher.device_updates();
        let published = publisher.finished().await;
        self.last_device = device.borrow().clone();
        published
    }

    pub async fn unmount(mut self) {
        self.publisher.take();
        release(self.connection.take()).await;
        log::info!("🛑 Sesión del conductor cerrada (ruta {})", self.route.id);
    }
}

pub struct ViewerSession {
    role: UserRole,
    route_id: i64,
    route: Option<Route>,
    stops: Vec<Stop>,
    road_path: Vec<LatLng>,
    stale_after: Duration,
    subscription: Option<SubscriptionHandle>,
    connection: Option<Arc<ConnectionManager>>,
}

impl ViewerSession {
    pub fn route_id(&self) -> i64 {
        self.route_id
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn bus_position(&self) -> Option<BusPosition> {
        self.subscription.as_ref().and_then(|s| s.position())
    }

    pub fn subscription(&self) -> Option<&SubscriptionHandle> {
        self.subscription.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, |c| c.current_state())
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionManager>> {
        self.connection.as_ref()
    }

    pub fn freshness(&self) -> Option<Freshness> {
        self.subscription
            .as_ref()
            .and_then(|s| s.freshness(Utc::now(), self.stale_after))
    }

    pub fn scene(&self) -> MapScene {
        let bus = self.bus_position();
        map_composer::compose(self.role, &self.stops, &self.road_path, bus.as_ref(), None)
    }

    pub async fn unmount(mut self) {
        self.subscription.take();
        release(self.connection.take()).await;
        log::info!("🛑 Seguimiento de la ruta {} cerrado", self.route_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::loopback_relay::LoopbackRelay;
    use crate::controllers::map_composer::CameraMode;
    use crate::services::location_publisher::ReplayLocationSource;
    use crate::test_support::{FakeRoadPath, FakeTransportApi};
    use chrono::TimeZone;
    use serde_json::json;
    use std::time::Duration;

    fn screen(relay: &LoopbackRelay, path: Vec<LatLng>) -> RoutesScreen {
        RoutesScreen::new(
            Arc::new(FakeTransportApi::with_route_and_stops()),
            Arc::new(FakeRoadPath::new(path)),
            Arc::new(relay.clone()),
            BackoffPolicy {
                initial: Duration::from_millis(10),
                max: Duration::from_millis(50),
                ..BackoffPolicy::default()
            },
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()
    }

    #[tokio::test]
    async fn test_driver_session_publishes_and_follows_device() {
        let relay = LoopbackRelay::new();
        let screen = screen(&relay, vec![LatLng::new(0.0, 0.0), LatLng::new(2.0, 2.0)]);
        let fixes = vec![GpsFix {
            latitude: 17.40,
            longitude: 78.48,
            heading: Some(90.0),
            accuracy_m: None,
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }];
        let source = ReplayLocationSource::new(fixes);

        let mut session = screen
            .mount_driver(&source, WatchOptions::default(), today())
            .await
            .unwrap();
        assert!(session.connection().unwrap().wait_connected().await);
        assert_eq!(session.finish_watch().await, 1);

        let scene = session.scene();
        assert_eq!(scene.stop_markers.len(), 3);
        assert!(scene.bus_marker.is_none());
        assert_eq!(
            scene.camera,
            CameraMode::FollowUser {
                center: Some(LatLng::new(17.40, 78.48))
            }
        );

        session.marker_tap(10).await.unwrap();
        assert_eq!(session.attendance().stop_id(), Some(10));
        session.unmount().await;
    }

    #[tokio::test]
    async fn test_viewer_session_shows_bus_marker() {
        let relay = LoopbackRelay::new();
        let screen = screen(&relay, vec![]);

        let session = screen
            .mount_viewer(UserRole::Parent, None, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(session.route_id(), 1);
        assert!(session.connection().unwrap().wait_connected().await);

        let mut updates = session.subscription().unwrap().updates();
        // Esperar a que la sala tenga al suscriptor
        while relay.broadcast_to_route(1, json!({"lat": 17.40, "lng": 78.48})) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        updates.changed().await.unwrap();

        let scene = session.scene();
        assert_eq!(scene.bus_marker.unwrap().coordinates, [78.48, 17.40]);
        assert_eq!(scene.camera, CameraMode::Fixed);
        assert_eq!(session.freshness(), Some(Freshness::Live));

        session.unmount().await;
        assert_eq!(relay.session_count(), 0);
    }

    #[tokio::test]
    async fn test_driver_cannot_mount_viewer() {
        let relay = LoopbackRelay::new();
        let screen = screen(&relay, vec![]);
        assert!(screen
            .mount_viewer(UserRole::Driver, Some(1), Duration::from_secs(30))
            .await
            .is_err());
        assert_eq!(relay.connect_count(), 0);
    }
}
