//! DTOs de APIs externas
//!
//! Estructuras de transporte para OSRM y envoltorios del backend.

pub mod osrm_dto;
pub mod transport_dto;
