//! Composición del mapa de rutas
//!
//! Una sola escena para todos los roles: la línea del trazado, un marcador
//! numerado por parada y el bus cuando se conoce su posición. El toque sobre
//! un marcador se despacha según el rol.

use crate::models::location::{BusPosition, GpsFix, LatLng};
use crate::models::role::UserRole;
use crate::models::stop::Stop;

/// Marcador de parada con su posición 1-based en la ruta
#[derive(Debug, Clone, PartialEq)]
pub struct StopMarker {
    pub stop_id: i64,
    pub label: String,
    pub title: String,
    pub coordinate: LatLng,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusMarker {
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
    pub heading: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraMode {
    /// Solo el conductor: la cámara sigue al dispositivo
    FollowUser { center: Option<LatLng> },
    Fixed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapScene {
    pub path_line: Vec<LatLng>,
    pub stop_markers: Vec<StopMarker>,
    pub bus_marker: Option<BusMarker>,
    pub camera: CameraMode,
}

/// Qué abre un toque sobre un marcador de parada
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerAction {
    OpenStopEditor { stop_id: i64 },
    OpenAttendance { stop_id: i64 },
    None,
}

/// Qué hace un toque sobre el mapa vacío
#[derive(Debug, Clone, PartialEq)]
pub enum MapTapAction {
    StageStop { coordinate: LatLng },
    None,
}

/// Componer la escena; `stops` ya ordenadas por `stop_order`
pub fn compose(
    role: UserRole,
    stops: &[Stop],
    path: &[LatLng],
    bus: Option<&BusPosition>,
    device: Option<&GpsFix>,
) -> MapScene {
    let stop_markers = stops
        .iter()
        .enumerate()
        .map(|(index, stop)| StopMarker {
            stop_id: stop.id,
            label: (index + 1).to_string(),
            title: stop.stop_name.clone(),
            coordinate: stop.coordinate(),
        })
        .collect();

    let bus_marker = bus.map(|position| BusMarker {
        coordinates: position.coordinates,
        heading: position.heading.unwrap_or(0.0),
    });

    let camera = match role {
        UserRole::Driver => CameraMode::FollowUser {
            center: device.map(|fix| LatLng::new(fix.latitude, fix.longitude)),
        },
        _ => CameraMode::Fixed,
    };

    MapScene {
        path_line: path.to_vec(),
        stop_markers,
        bus_marker,
        camera,
    }
}

pub fn marker_action(role: UserRole, stop_id: i64) -> MarkerAction {
    match role {
        UserRole::Admin => MarkerAction::OpenStopEditor { stop_id },
        UserRole::Driver => MarkerAction::OpenAttendance { stop_id },
        UserRole::Student | UserRole::Parent => MarkerAction::None,
    }
}

pub fn map_tap_action(role: UserRole, route_open: bool, coordinate: LatLng) -> MapTapAction {
    if role == UserRole::Admin && route_open {
        MapTapAction::StageStop { coordinate }
    } else {
        MapTapAction::None
    }
}
