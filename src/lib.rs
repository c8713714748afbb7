//! Cliente de seguimiento de buses escolares
//!
//! Trazado de rutas por carretera, canal de ubicación en vivo entre el
//! conductor y las familias, editor de rutas y paradas y toma de asistencia.

pub mod clients;
pub mod config;
pub mod controllers;
pub mod dto;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;
