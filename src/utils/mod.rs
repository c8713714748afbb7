//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación,
//! geometría y codificación de polilíneas.

pub mod errors;
pub mod geo;
pub mod polyline;
pub mod validation;

pub use errors::*;
