//! Modelo de Route
//!
//! Este módulo contiene el struct Route y sus variantes para CRUD operations.
//! Mapea exactamente al JSON que devuelve `/transport/routes`.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::validation::validate_not_empty;

/// Ruta de bus con vehículo, conductor y ayudante opcionales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub route_name: String,
    #[serde(default)]
    pub bus_number: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<i64>,
    #[serde(default)]
    pub driver_id: Option<i64>,
    #[serde(default)]
    pub conductor_id: Option<i64>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub conductor_name: Option<String>,
}

impl Route {
    /// Texto del bus para listados, `-` si no hay vehículo asignado
    pub fn bus_label(&self) -> &str {
        self.bus_number.as_deref().filter(|s| !s.is_empty()).unwrap_or("-")
    }

    /// Texto del conductor para listados, `-` si no hay conductor asignado
    pub fn driver_label(&self) -> &str {
        self.driver_name.as_deref().filter(|s| !s.is_empty()).unwrap_or("-")
    }
}

/// Request para crear una nueva ruta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateRouteRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub route_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conductor_id: Option<i64>,
}

/// Request para actualizar una ruta existente
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct UpdateRouteRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub route_name: String,

    pub vehicle_id: Option<i64>,
    pub driver_id: Option<i64>,
    pub conductor_id: Option<i64>,
}

impl From<&Route> for UpdateRouteRequest {
    fn from(route: &Route) -> Self {
        Self {
            route_name: route.route_name.clone(),
            vehicle_id: route.vehicle_id,
            driver_id: route.driver_id,
            conductor_id: route.conductor_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_deserializes_with_missing_optionals() {
        let route: Route = serde_json::from_str(r#"{"id": 3, "route_name": "North Loop"}"#).unwrap();
        assert_eq!(route.id, 3);
        assert_eq!(route.bus_label(), "-");
        assert_eq!(route.driver_label(), "-");
    }

    #[test]
    fn test_create_route_validation() {
        let blank = CreateRouteRequest {
            route_name: "   ".to_string(),
            vehicle_id: None,
            driver_id: None,
            conductor_id: None,
        };
        assert!(blank.validate().is_err());

        let ok = CreateRouteRequest {
            route_name: "North Loop".to_string(),
            vehicle_id: Some(2),
            driver_id: None,
            conductor_id: None,
        };
        assert!(ok.validate().is_ok());
        let json = serde_json::to_value(&ok).unwrap();
        assert!(json.get("driver_id").is_none());
    }
}
