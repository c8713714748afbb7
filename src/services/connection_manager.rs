//! Gestor de la conexión del canal de ubicación en vivo
//!
//! Una conexión larga por sesión, con ciclo de vida explícito:
//! `Connecting → Connected → Reconnecting { attempt } → … → Disconnected`.
//! El gestor recuerda las rutas unidas y vuelve a emitir `join_route` tras
//! cada reconexión. Los `emit` sin conexión se descartan (como mucho una vez).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clients::socket_transport::{SocketSession, SocketSignal, SocketTransport};
use crate::config::EnvironmentConfig;

pub const JOIN_ROUTE_EVENT: &str = "join_route";

const EVENT_BUFFER: usize = 64;

/// Estado visible de la conexión
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, retry_in: Duration },
    Disconnected,
}

/// Backoff exponencial con jitter
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
    /// Fracción de jitter simétrico, 0.2 = ±20 %
    pub jitter: f64,
    /// `None` = reintentar para siempre
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: 0.2,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.reconnect_initial_ms),
            max: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.reconnect_max_attempts,
            ..Self::default()
        }
    }

    /// Retardo sin jitter para el intento `attempt` (1-based)
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let millis = self.initial.as_millis() as f64 * self.factor.powi(exponent);
        Duration::from_millis(millis.min(self.max.as_millis() as f64) as u64)
    }

    /// Retardo con jitter, nunca por encima de `max`
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt).as_millis() as f64;
        let spread = base * self.jitter.clamp(0.0, 1.0);
        let jittered = if spread > 0.0 {
            base + rng.gen_range(-spread..=spread)
        } else {
            base
        };
        Duration::from_millis(jittered.clamp(0.0, self.max.as_millis() as f64) as u64)
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(false, |max| attempt > max)
    }
}

/// Evento recibido del servidor
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub name: String,
    pub payload: Value,
}

enum Command {
    Emit { event: String, payload: Value },
    Join(i64),
    Shutdown,
}

enum ServeOutcome {
    Shutdown,
    Lost(String),
}

/// Conexión de la sesión; se comparte con `Arc` entre publicador y suscriptor
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Sender<InboundEvent>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Arrancar la conexión en segundo plano
    pub fn start(transport: Arc<dyn SocketTransport>, policy: BackoffPolicy) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);

        let task = tokio::spawn(run_connection(
            transport,
            policy,
            commands_rx,
            state_tx,
            events_tx.clone(),
        ));

        Self {
            commands: commands_tx,
            state: state_rx,
            events: events_tx,
            task: Some(task),
        }
    }

    /// Emitir sin confirmación; sin conexión el evento se descarta
    pub fn emit(&self, event: &str, payload: Value) {
        let _ = self.commands.send(Command::Emit {
            event: event.to_string(),
            payload,
        });
    }

    /// Unirse a la sala de una ruta; se repite tras cada reconexión
    pub fn join_route(&self, route_id: i64) {
        let _ = self.commands.send(Command::Join(route_id));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Esperar hasta que la conexión quede en `Connected`
    pub async fn wait_connected(&self) -> bool {
        let mut state = self.state.clone();
        let connected = state
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Disconnected))
            .await
            .map(|s| *s == ConnectionState::Connected)
            .unwrap_or(false);
        connected
    }

    /// Cerrar la conexión aunque haya otras referencias vivas
    pub async fn close(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == ConnectionState::Disconnected).await;
    }

    /// Cerrar la conexión y esperar a que termine la tarea
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // La tarea se desconecta sola al recibir Shutdown
        let _ = self.commands.send(Command::Shutdown);
    }
}

async fn run_connection(
    transport: Arc<dyn SocketTransport>,
    policy: BackoffPolicy,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<InboundEvent>,
) {
    let mut joined: BTreeSet<i64> = BTreeSet::new();
    let mut attempt: u32 = 0;
    let mut rng = StdRng::from_entropy();

    'connection: loop {
        let (signal_tx, mut signal_rx) = mpsc::unbounded_channel();

        // Mientras conecta se siguen atendiendo los comandos; los emit quedan
        // en espera hasta saber si la conexión prospera
        let mut pending: Vec<(String, Value)> = Vec::new();
        let mut connecting = transport.connect(signal_tx);
        let connected = loop {
            tokio::select! {
                result = &mut connecting => break result,
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break 'connection,
                    Some(Command::Join(route_id)) => {
                        joined.insert(route_id);
                    }
                    Some(Command::Emit { event, payload }) => pending.push((event, payload)),
                },
            }
        };

        match connected {
            Ok(session) => {
                attempt = 0;
                state_tx.send_replace(ConnectionState::Connected);
                info!("🔌 Canal de ubicación conectado");

                for route_id in &joined {
                    if let Err(e) = session.emit(JOIN_ROUTE_EVENT, json!(route_id)).await {
                        warn!("⚠️ No se pudo volver a unir la ruta {}: {}", route_id, e);
                    }
                }
                for (event, payload) in pending.drain(..) {
                    if let Err(e) = session.emit(&event, payload).await {
                        warn!("⚠️ Evento '{}' en espera no enviado: {}", event, e);
                    }
                }

                let outcome = serve(session.as_ref(), &mut commands, &mut signal_rx, &events_tx, &mut joined).await;
                let _ = session.disconnect().await;

                match outcome {
                    ServeOutcome::Shutdown => break 'connection,
                    ServeOutcome::Lost(reason) => warn!("📴 Conexión perdida: {}", reason),
                }
            }
            Err(e) => {
                warn!("❌ Error conectando el canal de ubicación: {}", e);
                if !pending.is_empty() {
                    debug!("📭 {} eventos descartados: sin conexión", pending.len());
                }
            }
        }

        attempt += 1;
        if policy.exhausted(attempt) {
            warn!("🛑 Reintentos agotados ({}), canal desconectado", attempt - 1);
            break 'connection;
        }

        let delay = policy.delay_for(attempt, &mut rng);
        state_tx.send_replace(ConnectionState::Reconnecting {
            attempt,
            retry_in: delay,
        });
        info!("⏳ Reintentando conexión en {:?} (intento {})", delay, attempt);

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break 'connection,
                    Some(Command::Join(route_id)) => {
                        joined.insert(route_id);
                    }
                    Some(Command::Emit { event, .. }) => {
                        debug!("📭 Evento '{}' descartado: sin conexión", event);
                    }
                },
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    info!("👋 Canal de ubicación cerrado");
}

async fn serve(
    session: &dyn SocketSession,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    signals: &mut mpsc::UnboundedReceiver<SocketSignal>,
    events_tx: &broadcast::Sender<InboundEvent>,
    joined: &mut BTreeSet<i64>,
) -> ServeOutcome {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => return ServeOutcome::Shutdown,
                Some(Command::Emit { event, payload }) => {
                    if let Err(e) = session.emit(&event, payload).await {
                        return ServeOutcome::Lost(e.to_string());
                    }
                }
                Some(Command::Join(route_id)) => {
                    joined.insert(route_id);
                    if let Err(e) = session.emit(JOIN_ROUTE_EVENT, json!(route_id)).await {
                        return ServeOutcome::Lost(e.to_string());
                    }
                }
            },
            signal = signals.recv() => match signal {
                Some(SocketSignal::Event { name, payload }) => {
                    // Sin suscriptores el envío falla; no es un error
                    let _ = events_tx.send(InboundEvent { name, payload });
                }
                Some(SocketSignal::Closed) => return ServeOutcome::Lost("closed by server".to_string()),
                Some(SocketSignal::Error(message)) => return ServeOutcome::Lost(message),
                None => return ServeOutcome::Lost("transport dropped".to_string()),
            },
        }
    }
}
