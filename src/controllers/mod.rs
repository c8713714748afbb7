//! Controllers module
//!
//! Controladores de las vistas de rutas: máquinas de estado que reciben las
//! acciones del usuario, llaman al backend y exponen lo que hay que pintar.

pub mod attendance_controller;
pub mod map_composer;
pub mod route_editor_controller;
pub mod routes_screen_controller;

use crate::utils::errors::AppError;

/// Alerta modal para el usuario
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn error(error: &AppError) -> Self {
        Self {
            title: "Error".to_string(),
            message: error.user_message(),
        }
    }
}
