//! Modelo de Student (pasajero de una ruta)
//!
//! La asignación a una parada es una actualización directa de la clave
//! foránea `stop_id`: un estudiante está en como mucho una parada.

use serde::{Deserialize, Serialize};

/// Estudiante tal como lo devuelve `/transport/students`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub route_id: Option<i64>,
    #[serde(default)]
    pub stop_id: Option<i64>,
}

impl Student {
    pub fn is_assigned_to(&self, stop_id: i64) -> bool {
        self.stop_id == Some(stop_id)
    }

    /// Asignado a una parada distinta de `stop_id`
    pub fn is_assigned_elsewhere(&self, stop_id: i64) -> bool {
        matches!(self.stop_id, Some(other) if other != stop_id)
    }

    /// Texto secundario para la fila: clase y número de lista
    pub fn subtitle(&self) -> String {
        let class_name = self.class_name.as_deref().unwrap_or("-");
        let roll = self.roll_number.as_deref().unwrap_or("-");
        format!("{} · {}", class_name, roll)
    }
}

/// Request para asignar (`Some`) o quitar (`None`) la parada de un estudiante
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignStopRequest {
    pub stop_id: Option<i64>,
}
