use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use framewire_transport::{Stream, TcpTransport};
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::error::{Result, SessionError};
use crate::observer::ObserverList;
use crate::worker::Worker;

/// Pause after a failed accept so a persistent fault cannot spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a [`Listener`]. Moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Accepting,
    Stopping,
    Closed,
}

impl ListenerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerState::Idle => "idle",
            ListenerState::Accepting => "accepting",
            ListenerState::Stopping => "stopping",
            ListenerState::Closed => "closed",
        }
    }
}

/// Callbacks fired from a listener's accept thread.
pub trait ListenerObserver: Send + Sync {
    /// The accept loop is running. Fired before any `on_request`.
    fn on_started(&self, _listener: &Listener) {}

    /// The accept loop has exited. Fired at most once per listener.
    fn on_stopped(&self, _listener: &Listener) {}

    /// A connection was accepted.
    ///
    /// The listener drops its handle once every observer has returned; call
    /// [`Stream::try_clone`] to keep the connection.
    fn on_request(&self, listener: &Listener, stream: &Stream);
}

struct ListenerInner {
    id: u64,
    local_addr: SocketAddr,
    transport: Mutex<Option<Arc<TcpTransport>>>,
    config: ListenerConfig,
    observers: ObserverList<dyn ListenerObserver>,
    state: Mutex<ListenerState>,
    worker: Mutex<Option<Worker>>,
}

/// A bound TCP port with a background accept loop.
///
/// `Listener` is a cheap handle; clones refer to the same socket and loop.
/// The accept loop holds a handle of its own, so call [`Listener::close`] to
/// stop it and release the port.
#[derive(Clone)]
pub struct Listener {
    inner: Arc<ListenerInner>,
}

impl Listener {
    /// Bind to `port` on all interfaces with default configuration.
    pub fn bind(port: u16) -> Result<Self> {
        Self::with_config(TcpTransport::bind(port)?, ListenerConfig::default())
    }

    /// Bind to an explicit address.
    pub fn bind_addr(addr: SocketAddr, config: ListenerConfig) -> Result<Self> {
        Self::with_config(TcpTransport::bind_addr(addr)?, config)
    }

    /// Wrap an already bound transport.
    pub fn with_config(transport: TcpTransport, config: ListenerConfig) -> Result<Self> {
        let id = NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed);
        let local_addr = transport.local_addr();
        info!(listener = id, %local_addr, "listener bound");
        Ok(Self {
            inner: Arc::new(ListenerInner {
                id,
                local_addr,
                transport: Mutex::new(Some(Arc::new(transport))),
                config,
                observers: ObserverList::new(),
                state: Mutex::new(ListenerState::Idle),
                worker: Mutex::new(None),
            }),
        })
    }

    pub fn add_observer(&self, observer: Arc<dyn ListenerObserver>) {
        self.inner.observers.add(observer);
    }

    /// Remove an observer by identity.
    pub fn remove_observer(&self, observer: &Arc<dyn ListenerObserver>) -> bool {
        self.inner.observers.remove(observer)
    }

    /// Spawn the accept loop. Only valid from [`ListenerState::Idle`].
    pub fn start(&self) -> Result<()> {
        let mut worker = lock(&self.inner.worker);
        let transport = {
            let mut state = lock(&self.inner.state);
            if *state != ListenerState::Idle {
                return Err(SessionError::InvalidState {
                    action: "start listener",
                    state: state.as_str(),
                });
            }
            let Some(transport) = lock(&self.inner.transport).clone() else {
                return Err(SessionError::InvalidState {
                    action: "start listener",
                    state: ListenerState::Closed.as_str(),
                });
            };
            *state = ListenerState::Accepting;
            transport
        };

        let listener = self.clone();
        let spawned = Worker::spawn(format!("server-{}", self.inner.id), move || {
            listener.accept_loop(&transport);
        });
        match spawned {
            Ok(spawned) => {
                *worker = Some(spawned);
                Ok(())
            }
            Err(err) => {
                *lock(&self.inner.state) = ListenerState::Idle;
                Err(err)
            }
        }
    }

    /// Stop accepting, wait for the loop to exit, and release the port.
    ///
    /// The wait is bounded by [`ListenerConfig::shutdown_timeout`]. Closing an
    /// already closed listener is a no-op.
    ///
    /// The blocked accept is released by a loopback self-connect (see
    /// [`TcpTransport::wake`]). If that connect fails, for instance because
    /// the backlog is full, the accept thread is detached once the timeout
    /// expires. The state still reads [`ListenerState::Closed`], but
    /// `on_stopped` is delayed and the port stays bound until the next
    /// inbound connection lets the detached thread exit.
    pub fn close(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            match *state {
                ListenerState::Idle => {
                    *state = ListenerState::Closed;
                    lock(&self.inner.transport).take();
                    debug!(listener = self.inner.id, "closed idle listener");
                    return Ok(());
                }
                ListenerState::Accepting => *state = ListenerState::Stopping,
                ListenerState::Stopping | ListenerState::Closed => return Ok(()),
            }
        }

        let transport = lock(&self.inner.transport).clone();
        if let Some(transport) = transport {
            if let Err(err) = transport.wake() {
                warn!(listener = self.inner.id, error = %err, "failed to wake accept loop");
            }
        }

        let worker = lock(&self.inner.worker).take();
        if let Some(worker) = worker {
            worker.join(self.inner.config.shutdown_timeout);
        }

        lock(&self.inner.transport).take();
        *lock(&self.inner.state) = ListenerState::Closed;
        info!(listener = self.inner.id, "listener closed");
        Ok(())
    }

    /// Alias for [`Listener::close`].
    pub fn stop(&self) -> Result<()> {
        self.close()
    }

    pub fn state(&self) -> ListenerState {
        *lock(&self.inner.state)
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == ListenerState::Accepting
    }

    /// The bound address, with the real port when bound to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    fn accept_loop(&self, transport: &TcpTransport) {
        debug!(listener = self.inner.id, "accept loop started");
        self.inner.observers.for_each(|o| o.on_started(self));

        while self.is_accepting() {
            match transport.accept() {
                Ok(stream) => {
                    if !self.is_accepting() {
                        debug!(listener = self.inner.id, "dropping connection accepted during shutdown");
                        break;
                    }
                    if self.inner.config.nodelay {
                        if let Err(err) = stream.set_nodelay(true) {
                            debug!(error = %err, "failed to set TCP_NODELAY");
                        }
                    }
                    debug!(listener = self.inner.id, peer = ?stream.peer_addr(), "accepted connection");
                    self.inner.observers.for_each(|o| o.on_request(self, &stream));
                }
                Err(err) => {
                    if !self.is_accepting() {
                        break;
                    }
                    error!(listener = self.inner.id, error = %err, "accept failed");
                    std::thread::sleep(ACCEPT_RETRY_DELAY);
                }
            }
        }

        self.inner.observers.for_each(|o| o.on_stopped(self));
        debug!(listener = self.inner.id, "accept loop stopped");
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.inner.id)
            .field("local_addr", &self.inner.local_addr)
            .field("state", &self.state())
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
