//! Services module
//!
//! Este módulo contiene la lógica de integración del seguimiento de buses:
//! trazado por carretera, conexión del canal en vivo, publicación de la
//! ubicación del conductor y seguimiento para estudiantes y padres.

pub mod connection_manager;
pub mod location_publisher;
pub mod location_subscriber;
pub mod road_path_service;

pub use connection_manager::{BackoffPolicy, ConnectionManager, ConnectionState};
pub use location_publisher::{LocationPublisher, LocationSource, PublisherHandle, ReplayLocationSource, WatchOptions};
pub use location_subscriber::{Freshness, LocationSubscriber, SubscriptionHandle, TrackedBus};
pub use road_path_service::{RoadPathResolver, RoadPathService};
