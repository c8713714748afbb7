//! Modelo de asistencia del bus
//!
//! El conductor marca a cada pasajero presente o ausente en su parada.
//! Las marcas se identifican por parada + pasajero + viaje; la última gana.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado de asistencia
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }
}

/// Request para marcar la asistencia de un pasajero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkAttendanceRequest {
    pub student_id: i64,
    pub stop_id: i64,
    pub route_id: i64,
    pub trip_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// Registro de asistencia tal como lo devuelve el backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub student_id: i64,
    #[serde(default)]
    pub stop_id: Option<i64>,
    #[serde(default)]
    pub route_id: Option<i64>,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Filtros para listar marcas existentes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttendanceFilters {
    pub route_id: i64,
    pub stop_id: i64,
    pub date: NaiveDate,
}

/// Conteo de marcas en la parada seleccionada
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub unmarked: usize,
}
