//! Transporte del canal de ubicación en vivo
//!
//! `SocketTransport` abre una sesión y entrega el tráfico entrante como
//! `SocketSignal` por un canal; `SocketSession` emite eventos y se desconecta.
//! La reconexión no vive aquí: la decide `ConnectionManager`.

use async_trait::async_trait;
use futures::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::utils::errors::{AppError, AppResult};

/// Tráfico entrante de una sesión
#[derive(Debug, Clone, PartialEq)]
pub enum SocketSignal {
    Event { name: String, payload: Value },
    Closed,
    Error(String),
}

#[async_trait]
pub trait SocketSession: Send + Sync {
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()>;
    async fn disconnect(&self) -> AppResult<()>;
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self, inbound: mpsc::UnboundedSender<SocketSignal>) -> AppResult<Box<dyn SocketSession>>;
}

/// Transporte Socket.IO sobre websocket
pub struct SocketIoTransport {
    url: String,
}

impl SocketIoTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Convertir el payload de Socket.IO en un único valor JSON
fn payload_to_value(payload: Payload) -> Value {
    match payload {
        Payload::Text(mut values) => {
            if values.len() == 1 {
                values.remove(0)
            } else {
                Value::Array(values)
            }
        }
        _ => Value::Null,
    }
}

#[async_trait]
impl SocketTransport for SocketIoTransport {
    async fn connect(&self, inbound: mpsc::UnboundedSender<SocketSignal>) -> AppResult<Box<dyn SocketSession>> {
        log::info!("🔌 Conectando a Socket.IO: {}", self.url);

        let events_tx = inbound.clone();
        let close_tx = inbound.clone();
        let error_tx = inbound;

        let client = ClientBuilder::new(self.url.clone())
            .transport_type(TransportType::Websocket)
            .reconnect(false)
            .on_any(move |event: Event, payload: Payload, _socket: Client| {
                let tx = events_tx.clone();
                async move {
                    if let Event::Custom(name) = event {
                        let _ = tx.send(SocketSignal::Event {
                            name,
                            payload: payload_to_value(payload),
                        });
                    }
                }
                .boxed()
            })
            .on(Event::Close, move |_payload: Payload, _socket: Client| {
                let tx = close_tx.clone();
                async move {
                    let _ = tx.send(SocketSignal::Closed);
                }
                .boxed()
            })
            .on(Event::Error, move |payload: Payload, _socket: Client| {
                let tx = error_tx.clone();
                async move {
                    let _ = tx.send(SocketSignal::Error(payload_to_value(payload).to_string()));
                }
                .boxed()
            })
            .connect()
            .await
            .map_err(|e| AppError::Socket(e.to_string()))?;

        log::info!("✅ Socket conectado");
        Ok(Box::new(SocketIoSession { client }))
    }
}

struct SocketIoSession {
    client: Client,
}

#[async_trait]
impl SocketSession for SocketIoSession {
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()> {
        self.client
            .emit(event, payload)
            .await
            .map_err(|e| AppError::Socket(e.to_string()))
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.client
            .disconnect()
            .await
            .map_err(|e| AppError::Socket(e.to_string()))
    }
}
