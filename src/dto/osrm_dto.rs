//! DTOs para la API de rutas de OSRM
//!
//! Solo se modela lo que consume el cliente: el código de respuesta y la
//! geometría codificada de la primera ruta.

use serde::{Deserialize, Serialize};

/// Response de `GET /route/v1/driving/{coords}?overview=full&geometries=polyline`
#[derive(Debug, Serialize, Deserialize)]
pub struct OsrmRouteResponse {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

/// Ruta calculada por OSRM
#[derive(Debug, Serialize, Deserialize)]
pub struct OsrmRoute {
    /// Polilínea codificada (precisión 5)
    pub geometry: String,
    #[serde(default)]
    pub distance: f64, // metros
    #[serde(default)]
    pub duration: f64, // segundos
}

impl OsrmRouteResponse {
    pub fn is_ok(&self) -> bool {
        self.code == "Ok"
    }
}
