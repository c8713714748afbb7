//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Nada se deja
//! hardcodeado: URLs del backend, del socket y de OSRM, y la API key de
//! los tiles del mapa se inyectan por variables de entorno.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::models::role::UserRole;
use crate::utils::errors::{config_error, AppResult};

/// Configuración del entorno
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub http_timeout_secs: u64,
    pub socket_url: String,
    pub osrm_base_url: String,
    pub osrm_timeout_secs: u64,
    pub map_tile_api_key: Option<String>,
    // GPS del conductor
    pub location_distance_filter_m: f64,
    pub location_interval_secs: u64,
    // Reconexión del socket
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    pub reconnect_max_attempts: Option<u32>,
    pub position_stale_secs: u64,
    // Agente bus-tracker
    pub tracker_role: UserRole,
    pub route_id: Option<i64>,
    pub gps_replay_file: Option<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            api_base_url: "http://localhost:5000/api".to_string(),
            api_token: None,
            http_timeout_secs: 30,
            socket_url: "http://localhost:5000".to_string(),
            osrm_base_url: "https://router.project-osrm.org".to_string(),
            osrm_timeout_secs: 10,
            map_tile_api_key: None,
            location_distance_filter_m: 10.0,
            location_interval_secs: 3,
            reconnect_initial_ms: 500,
            reconnect_max_ms: 30_000,
            reconnect_max_attempts: None,
            position_stale_secs: 30,
            tracker_role: UserRole::Student,
            route_id: None,
            gps_replay_file: None,
        }
    }
}

impl EnvironmentConfig {
    /// Cargar la configuración desde variables de entorno, con defaults
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            api_base_url: env::var("API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            api_token: non_empty_var("API_TOKEN"),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            socket_url: env::var("SOCKET_URL").unwrap_or(defaults.socket_url),
            osrm_base_url: env::var("OSRM_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.osrm_base_url),
            osrm_timeout_secs: parse_var("OSRM_TIMEOUT_SECS", defaults.osrm_timeout_secs)?,
            map_tile_api_key: non_empty_var("MAP_TILE_API_KEY"),
            location_distance_filter_m: parse_var(
                "LOCATION_DISTANCE_FILTER_M",
                defaults.location_distance_filter_m,
            )?,
            location_interval_secs: parse_var("LOCATION_INTERVAL_SECS", defaults.location_interval_secs)?,
            reconnect_initial_ms: parse_var("RECONNECT_INITIAL_MS", defaults.reconnect_initial_ms)?,
            reconnect_max_ms: parse_var("RECONNECT_MAX_MS", defaults.reconnect_max_ms)?,
            reconnect_max_attempts: parse_optional_var("RECONNECT_MAX_ATTEMPTS")?,
            position_stale_secs: parse_var("POSITION_STALE_SECS", defaults.position_stale_secs)?,
            tracker_role: parse_var("TRACKER_ROLE", defaults.tracker_role)?,
            route_id: parse_optional_var("ROUTE_ID")?,
            gps_replay_file: non_empty_var("GPS_REPLAY_FILE"),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn osrm_timeout(&self) -> Duration {
        Duration::from_secs(self.osrm_timeout_secs)
    }

    pub fn position_stale_after(&self) -> Duration {
        Duration::from_secs(self.position_stale_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match non_empty_var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| config_error(name, &raw)),
        None => Ok(default),
    }
}

fn parse_optional_var<T: FromStr>(name: &str) -> AppResult<Option<T>> {
    match non_empty_var(name) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| config_error(name, &raw)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Un solo test toca el entorno del proceso para no competir con otros hilos
    #[test]
    fn test_from_env_overrides_and_errors() {
        env::set_var("API_BASE_URL", "http://school.test/api/");
        env::set_var("OSRM_TIMEOUT_SECS", "4");
        env::set_var("TRACKER_ROLE", "driver");
        env::set_var("ROUTE_ID", "12");
        env::remove_var("MAP_TILE_API_KEY");

        let config = EnvironmentConfig::from_env().unwrap();
        assert_eq!(config.api_base_url, "http://school.test/api");
        assert_eq!(config.osrm_timeout(), Duration::from_secs(4));
        assert_eq!(config.tracker_role, UserRole::Driver);
        assert_eq!(config.route_id, Some(12));
        assert!(config.map_tile_api_key.is_none());
        assert_eq!(config.location_distance_filter_m, 10.0);

        env::set_var("RECONNECT_MAX_MS", "soon");
        assert!(EnvironmentConfig::from_env().is_err());

        for name in ["API_BASE_URL", "OSRM_TIMEOUT_SECS", "TRACKER_ROLE", "ROUTE_ID", "RECONNECT_MAX_MS"] {
            env::remove_var(name);
        }
    }
}
