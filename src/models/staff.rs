//! Vehículos y personal de transporte
//!
//! Opciones para los selectores del formulario de ruta.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub bus_number: String,
    #[serde(default)]
    pub capacity: Option<i32>,
}

/// Rol del personal en `/transport/staff?role=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Driver,
    Conductor,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Driver => "driver",
            StaffRole::Conductor => "conductor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Opciones del formulario de ruta
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteFormOptions {
    pub vehicles: Vec<Vehicle>,
    pub drivers: Vec<StaffMember>,
    pub conductors: Vec<StaffMember>,
}
