//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del cliente de transporte
//! y su conversión al texto que se muestra al usuario en una alerta.

use reqwest::StatusCode;
use thiserror::Error;

/// Mensaje genérico cuando el backend no devuelve `message`
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";

/// Errores principales del cliente
#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message:?}")]
    Api {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Texto para la alerta: el `message` del servidor si existe, si no uno genérico
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api { message: Some(msg), .. } if !msg.trim().is_empty() => msg.clone(),
            AppError::Validation(_) => "Please check the form fields and try again.".to_string(),
            AppError::NotFound(msg) | AppError::InvalidState(msg) => msg.clone(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Estado HTTP si el error viene del backend
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AppError::Api { status, .. } => Some(*status),
            AppError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de validación
pub fn validation_error(field: &'static str, message: &'static str) -> AppError {
    use validator::ValidationError;

    let mut error = ValidationError::new("custom");
    error.add_param("field".into(), &field);
    error.add_param("message".into(), &message);

    let mut errors = validator::ValidationErrors::new();
    errors.add(field, error);

    AppError::Validation(errors)
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de estado inválido
pub fn invalid_state_error(message: &str) -> AppError {
    AppError::InvalidState(message.to_string())
}

/// Función helper para crear errores de configuración
pub fn config_error(variable: &str, value: &str) -> AppError {
    AppError::Config(format!("{} has an invalid value '{}'", variable, value))
}
