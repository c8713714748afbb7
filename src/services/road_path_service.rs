//! Servicio de trazado por carretera (OSRM)
//!
//! Dadas las paradas de una ruta en orden, pide a OSRM la geometría completa
//! que pasa por todas ellas y la decodifica en puntos para la capa de línea
//! del mapa. Cualquier fallo se degrada a "sin línea": nunca es un error
//! para quien llama.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::EnvironmentConfig;
use crate::dto::osrm_dto::OsrmRouteResponse;
use crate::models::location::LatLng;
use crate::models::stop::Stop;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::polyline;

/// Resolución del trazado que usan los controladores
#[async_trait]
pub trait RoadPathResolver: Send + Sync {
    async fn get_road_path(&self, stops: &[Stop]) -> Vec<LatLng>;
}

pub struct RoadPathService {
    base_url: String,
    client: Client,
}

impl RoadPathService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("SchoolBusTracker/1.0")
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        Self::new(config.osrm_base_url.clone(), config.osrm_timeout())
    }

    /// Trazado por carretera a través de todas las paradas, en orden
    ///
    /// Devuelve una secuencia vacía con menos de dos paradas (sin llamar a la
    /// red) o ante cualquier fallo del servicio.
    pub async fn get_road_path(&self, stops: &[Stop]) -> Vec<LatLng> {
        if stops.len() < 2 {
            return Vec::new();
        }

        match self.fetch_road_path(stops).await {
            Ok(points) => {
                log::info!("🛣️ Trazado OSRM con {} puntos para {} paradas", points.len(), stops.len());
                points
            }
            Err(e) => {
                log::warn!("⚠️ No se pudo obtener el trazado OSRM: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_road_path(&self, stops: &[Stop]) -> AppResult<Vec<LatLng>> {
        let url = format!(
            "{}/route/v1/driving/{}?overview=full&geometries=polyline",
            self.base_url,
            coordinates_path(stops)
        );
        log::debug!("🌐 OSRM: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Api {
                status,
                message: Some("routing service error".to_string()),
            });
        }

        let body: OsrmRouteResponse = response.json().await?;
        if !body.is_ok() {
            return Err(AppError::InvalidState(format!(
                "OSRM code {}: {}",
                body.code,
                body.message.unwrap_or_default()
            )));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| AppError::InvalidState("OSRM returned no routes".to_string()))?;

        polyline::decode(&route.geometry)
    }
}

#[async_trait]
impl RoadPathResolver for RoadPathService {
    async fn get_road_path(&self, stops: &[Stop]) -> Vec<LatLng> {
        RoadPathService::get_road_path(self, stops).await
    }
}

/// `lng,lat;lng,lat;...` en el orden de las paradas
pub fn coordinates_path(stops: &[Stop]) -> String {
    stops
        .iter()
        .map(|s| format!("{},{}", s.stop_lng, s.stop_lat))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: i64, lat: f64, lng: f64) -> Stop {
        Stop {
            id,
            route_id: 1,
            stop_name: format!("S{}", id),
            stop_lat: lat,
            stop_lng: lng,
            stop_order: id as i32,
        }
    }

    #[test]
    fn test_coordinates_path_is_lng_lat() {
        let stops = vec![stop(1, 17.4, 78.48), stop(2, 17.5, 78.5)];
        assert_eq!(coordinates_path(&stops), "78.48,17.4;78.5,17.5");
    }

    #[tokio::test]
    async fn test_fewer_than_two_stops_skips_network() {
        // Puerto 9 (discard): si se hiciera la petición fallaría igualmente,
        // pero con menos de dos paradas ni siquiera se intenta
        let service = RoadPathService::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        assert!(service.get_road_path(&[]).await.is_empty());
        assert!(service.get_road_path(&[stop(1, 0.0, 0.0)]).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_degrades_to_empty() {
        let service = RoadPathService::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let path = service
            .get_road_path(&[stop(1, 0.0, 0.0), stop(2, 1.0, 1.0)])
            .await;
        assert!(path.is_empty());
    }
}
