//! Relay de ubicación en proceso
//!
//! Implementa `SocketTransport` con la misma semántica de salas que el
//! servidor real: `join_route` une la sesión a la sala de la ruta y cada
//! `driver_location_update` se reenvía como `receive_location` al resto de
//! sesiones de esa sala. Sirve para ejecutar conductor y estudiantes en el
//! mismo proceso y para simular cortes de red.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::clients::socket_transport::{SocketSession, SocketSignal, SocketTransport};
use crate::utils::errors::{AppError, AppResult};

#[derive(Default)]
struct RelayState {
    next_session: u64,
    sessions: HashMap<u64, SessionEntry>,
    failing_connects: u32,
    connect_count: u32,
    emitted: Vec<(String, Value)>,
}

struct SessionEntry {
    inbound: mpsc::UnboundedSender<SocketSignal>,
    rooms: HashSet<i64>,
}

#[derive(Clone, Default)]
pub struct LoopbackRelay {
    inner: Arc<Mutex<RelayState>>,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RelayState> {
        // Un panic con el lock tomado no deja el estado a medias: se sigue usando
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rechazar las próximas `count` conexiones
    pub fn fail_next_connects(&self, count: u32) {
        self.state().failing_connects = count;
    }

    /// Cerrar todas las sesiones abiertas como lo haría una caída de red
    pub fn drop_all_sessions(&self) {
        let mut state = self.state();
        for (_, session) in state.sessions.drain() {
            let _ = session.inbound.send(SocketSignal::Closed);
        }
    }

    /// Enviar `receive_location` a todas las sesiones unidas a la ruta
    pub fn broadcast_to_route(&self, route_id: i64, payload: Value) -> usize {
        let state = self.state();
        deliver(&state, None, route_id, &payload)
    }

    pub fn connect_count(&self) -> u32 {
        self.state().connect_count
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    /// Eventos emitidos por los clientes, en orden de llegada
    pub fn emitted(&self) -> Vec<(String, Value)> {
        self.state().emitted.clone()
    }

    /// Eventos emitidos con un nombre dado
    pub fn emitted_named(&self, name: &str) -> Vec<Value> {
        self.state()
            .emitted
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

fn deliver(state: &RelayState, sender: Option<u64>, route_id: i64, payload: &Value) -> usize {
    let mut delivered = 0;
    for (id, session) in &state.sessions {
        if Some(*id) == sender || !session.rooms.contains(&route_id) {
            continue;
        }
        let signal = SocketSignal::Event {
            name: "receive_location".to_string(),
            payload: payload.clone(),
        };
        if session.inbound.send(signal).is_ok() {
            delivered += 1;
        }
    }
    delivered
}

#[async_trait]
impl SocketTransport for LoopbackRelay {
    async fn connect(&self, inbound: mpsc::UnboundedSender<SocketSignal>) -> AppResult<Box<dyn SocketSession>> {
        let mut state = self.state();
        state.connect_count += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(AppError::Socket("connection refused".to_string()));
        }

        state.next_session += 1;
        let id = state.next_session;
        state.sessions.insert(
            id,
            SessionEntry {
                inbound,
                rooms: HashSet::new(),
            },
        );

        Ok(Box::new(LoopbackSession {
            id,
            relay: self.clone(),
        }))
    }
}

struct LoopbackSession {
    id: u64,
    relay: LoopbackRelay,
}

#[async_trait]
impl SocketSession for LoopbackSession {
    async fn emit(&self, event: &str, payload: Value) -> AppResult<()> {
        let mut state = self.relay.state();
        if !state.sessions.contains_key(&self.id) {
            return Err(AppError::Socket("session closed".to_string()));
        }
        state.emitted.push((event.to_string(), payload.clone()));

        match event {
            "join_route" => {
                let route_id = payload
                    .as_i64()
                    .ok_or_else(|| AppError::Socket(format!("invalid route id {}", payload)))?;
                if let Some(session) = state.sessions.get_mut(&self.id) {
                    session.rooms.insert(route_id);
                }
            }
            "driver_location_update" => {
                let route_id = payload["routeId"]
                    .as_i64()
                    .ok_or_else(|| AppError::Socket("update without routeId".to_string()))?;
                let broadcast = json!({
                    "lat": payload["lat"],
                    "lng": payload["lng"],
                    "bearing": payload["bearing"],
                    "seq": payload["seq"],
                    "sentAt": payload["sentAt"],
                });
                deliver(&state, Some(self.id), route_id, &broadcast);
            }
            _ => {}
        }
        Ok(())
    }

    async fn disconnect(&self) -> AppResult<()> {
        self.relay.state().sessions.remove(&self.id);
        Ok(())
    }
}
