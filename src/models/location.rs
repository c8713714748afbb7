//! Modelos de ubicación
//!
//! Coordenadas para el mapa, lecturas de GPS del dispositivo y los payloads
//! del canal de ubicación en vivo (`driver_location_update`, `receive_location`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Punto `{latitude, longitude}` tal como lo consume la capa de línea del mapa
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Lectura del GPS del dispositivo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Rumbo en grados si el dispositivo lo reporta
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Payload de `driver_location_update` (cliente → servidor)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverLocationUpdate {
    pub route_id: i64,
    pub lat: f64,
    pub lng: f64,
    pub bearing: f64,
    pub seq: u64,
    pub sent_at: DateTime<Utc>,
}

/// Payload de `receive_location` (servidor → cliente)
///
/// Solo `lat` y `lng` son obligatorios; `seq` y `sentAt` llegan cuando el
/// conductor usa un publicador que los incluye.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationBroadcast {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub bearing: Option<f64>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

/// Posición actual del bus vista por estudiantes y padres
#[derive(Debug, Clone, PartialEq)]
pub struct BusPosition {
    /// `[longitude, latitude]`, el orden que usa el mapa
    pub coordinates: [f64; 2],
    pub heading: Option<f64>,
    pub seq: Option<u64>,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

impl BusPosition {
    pub fn from_broadcast(broadcast: &LocationBroadcast, received_at: DateTime<Utc>) -> Self {
        Self {
            coordinates: [broadcast.lng, broadcast.lat],
            heading: broadcast.bearing,
            seq: broadcast.seq,
            sent_at: broadcast.sent_at,
            received_at,
        }
    }

    pub fn longitude(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.coordinates[1]
    }
}
