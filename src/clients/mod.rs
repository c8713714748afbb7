//! Clients - HTTP and socket clients for external services
//!
//! This module contains the REST client for the school transport backend
//! and the transports of the live location channel.

pub mod loopback_relay;
pub mod socket_transport;
pub mod transport_api_client;

// Re-export main types for convenience
pub use loopback_relay::LoopbackRelay;
pub use socket_transport::{SocketIoTransport, SocketSession, SocketSignal, SocketTransport};
pub use transport_api_client::{HttpTransportApi, TransportApi};
