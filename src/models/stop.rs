//! Modelo de Stop
//!
//! Una parada pertenece a exactamente una ruta y tiene una posición (1-based)
//! a lo largo de ella. Solo se añaden al final: no hay reordenamiento.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::location::LatLng;
use crate::utils::validation::validate_not_empty;

/// Parada de una ruta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: i64,
    pub route_id: i64,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lng: f64,
    #[serde(default)]
    pub stop_order: i32,
}

impl Stop {
    pub fn coordinate(&self) -> LatLng {
        LatLng::new(self.stop_lat, self.stop_lng)
    }
}

/// Ordenar paradas por su posición a lo largo de la ruta
pub fn sort_by_order(stops: &mut [Stop]) {
    stops.sort_by_key(|s| (s.stop_order, s.id));
}

/// Request para crear una parada nueva
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateStopRequest {
    pub route_id: i64,

    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub stop_name: String,

    #[validate(range(min = -90.0, max = 90.0))]
    pub stop_lat: f64,

    #[validate(range(min = -180.0, max = 180.0))]
    pub stop_lng: f64,

    #[validate(range(min = 1))]
    pub stop_order: i32,
}

/// Request para renombrar una parada
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateStopRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub stop_name: String,

    pub stop_lat: f64,
    pub stop_lng: f64,
}
