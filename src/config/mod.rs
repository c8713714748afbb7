//! Configuración del proyecto
//!
//! Este módulo contiene las variables de entorno y otras configuraciones
//! del cliente de transporte.

pub mod environment;

pub use environment::*;
