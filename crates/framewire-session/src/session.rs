use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framewire_codec::{Connection, FrameStatsSnapshot, Message, Registry};
use framewire_transport::{Stream, TcpTransport};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::observer::ObserverList;
use crate::worker::Worker;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Session`].
///
/// `Stopped` means the receive loop ended on its own (the peer went away);
/// `Closed` means [`Session::close`] was called. Neither can be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Receiving,
    Stopped,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Receiving => "receiving",
            SessionState::Stopped => "stopped",
            SessionState::Closed => "closed",
        }
    }
}

/// Callbacks fired from a session's receive thread.
///
/// Callbacks run inline: a slow observer delays decoding of the next frame.
pub trait SessionObserver: Send + Sync {
    /// The receive loop is running. Fired before any `on_received`.
    fn on_started(&self, _session: &Session) {}

    /// The receive loop has exited.
    fn on_stopped(&self, _session: &Session) {}

    /// A message was decoded. Messages arrive in wire order.
    fn on_received(&self, session: &Session, message: &dyn Message);
}

struct SessionInner {
    id: u64,
    connection: Connection,
    config: SessionConfig,
    observers: ObserverList<dyn SessionObserver>,
    state: Mutex<SessionState>,
    worker: Mutex<Option<Worker>>,
}

/// One established connection with a background receive loop.
///
/// `Session` is a cheap handle; clones share the connection and the loop.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Wrap an established stream with default configuration.
    pub fn new(stream: Stream) -> Result<Self> {
        Self::with_config(stream, SessionConfig::default())
    }

    /// Wrap an established stream with explicit configuration.
    pub fn with_config(stream: Stream, config: SessionConfig) -> Result<Self> {
        if config.nodelay {
            if let Err(err) = stream.set_nodelay(true) {
                debug!(error = %err, "failed to set TCP_NODELAY");
            }
        }
        let connection = Connection::with_config(stream, config.frame.clone())?;
        Ok(Self::from_connection(connection, config))
    }

    /// Connect to `host:port` with default configuration.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, SessionConfig::default())
    }

    /// Connect to `host:port`; returns once the TCP connection is established.
    pub fn connect_with_config(host: &str, port: u16, config: SessionConfig) -> Result<Self> {
        let stream = TcpTransport::connect_timeout(host, port, config.connect_timeout)?;
        Self::with_config(stream, config)
    }

    /// Wrap a prepared connection, e.g. one given its own fallback registry.
    pub fn from_connection(connection: Connection, config: SessionConfig) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            session = id,
            transport = connection.transport_name(),
            peer = ?connection.peer_addr(),
            "session created"
        );
        Self {
            inner: Arc::new(SessionInner {
                id,
                connection,
                config,
                observers: ObserverList::new(),
                state: Mutex::new(SessionState::Idle),
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.inner.observers.add(observer);
    }

    /// Remove an observer by identity.
    pub fn remove_observer(&self, observer: &Arc<dyn SessionObserver>) -> bool {
        self.inner.observers.remove(observer)
    }

    /// Spawn the receive loop. Only valid from [`SessionState::Idle`].
    pub fn start(&self) -> Result<()> {
        let mut worker = lock(&self.inner.worker);
        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Idle {
                return Err(SessionError::InvalidState {
                    action: "start session",
                    state: state.as_str(),
                });
            }
            *state = SessionState::Receiving;
        }

        let session = self.clone();
        match Worker::spawn(format!("session-{}", self.inner.id), move || session.receive_loop()) {
            Ok(spawned) => {
                *worker = Some(spawned);
                Ok(())
            }
            Err(err) => {
                *lock(&self.inner.state) = SessionState::Idle;
                Err(err)
            }
        }
    }

    /// Stop receiving, shut the stream down, and wait for the loop to exit.
    ///
    /// The wait is bounded by [`SessionConfig::shutdown_timeout`]. Closing an
    /// already closed session is a no-op.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }

        if let Err(err) = self.inner.connection.shutdown() {
            debug!(session = self.inner.id, error = %err, "stream shutdown failed");
        }

        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker {
            worker.join(self.inner.config.shutdown_timeout);
        }
        info!(session = self.inner.id, "session closed");
        Ok(())
    }

    /// Frame and send one message on this session's connection.
    ///
    /// Returns the sequence number the frame carried.
    pub fn send(&self, message: &dyn Message) -> Result<u64> {
        Ok(self.inner.connection.write(message)?)
    }

    /// The connection-local registry, consulted before the fallback.
    pub fn registry(&self) -> &Registry {
        self.inner.connection.registry()
    }

    pub fn connection(&self) -> &Connection {
        &self.inner.connection
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn is_receiving(&self) -> bool {
        self.state() == SessionState::Receiving
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.connection.peer_addr()
    }

    pub fn in_count(&self) -> u64 {
        self.inner.connection.in_count()
    }

    pub fn out_count(&self) -> u64 {
        self.inner.connection.out_count()
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.inner.connection.stats()
    }

    fn receive_loop(&self) {
        debug!(session = self.inner.id, "receive loop started");
        self.inner.observers.for_each(|o| o.on_started(self));

        while self.is_receiving() {
            match self.inner.connection.read() {
                Ok(Some(message)) => {
                    self.inner
                        .observers
                        .for_each(|o| o.on_received(self, message.as_ref()));
                }
                Ok(None) => {}
                Err(err) if err.is_transport() => {
                    if self.is_receiving() {
                        info!(session = self.inner.id, error = %err, "connection lost");
                    }
                    break;
                }
                Err(err) => {
                    warn!(session = self.inner.id, error = %err, "dropped undecodable frame");
                }
            }
        }

        {
            let mut state = lock(&self.inner.state);
            if *state == SessionState::Receiving {
                *state = SessionState::Stopped;
            }
        }
        self.inner.observers.for_each(|o| o.on_stopped(self));
        debug!(session = self.inner.id, "receive loop stopped");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("connection", &self.inner.connection)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
