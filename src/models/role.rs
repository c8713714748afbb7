//! Rol del usuario de la sesión
//!
//! Decide qué vista de rutas se monta: editor (admin), colector de
//! asistencia (driver) o seguimiento en vivo (student / parent).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Driver,
    Student,
    Parent,
}

impl UserRole {
    /// Estudiantes y padres solo siguen el bus
    pub fn is_viewer(&self) -> bool {
        matches!(self, UserRole::Student | UserRole::Parent)
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "driver" => Ok(UserRole::Driver),
            "student" => Ok(UserRole::Student),
            "parent" => Ok(UserRole::Parent),
            other => Err(AppError::Config(format!("unknown role '{}'", other))),
        }
    }
}
