//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean exactamente
//! al JSON del backend de transporte y del canal de ubicación en vivo.

pub mod attendance;
pub mod location;
pub mod passenger;
pub mod role;
pub mod route;
pub mod staff;
pub mod stop;
