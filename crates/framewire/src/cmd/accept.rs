use std::sync::{Arc, Mutex, PoisonError};

use framewire::demo::register_demo_messages;
use framewire_session::{Listener, ListenerObserver, Session, SessionObserver};
use framewire_transport::Stream;
use tracing::{error, info};

/// Wraps every accepted stream in a started session that knows the demo
/// message types and reports to `observer`.
pub struct SessionAcceptor {
    observer: Arc<dyn SessionObserver>,
    sessions: Mutex<Vec<Session>>,
}

impl SessionAcceptor {
    pub fn new(observer: Arc<dyn SessionObserver>) -> Self {
        Self {
            observer,
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close every session accepted so far.
    pub fn close_all(&self) {
        for session in self.sessions() {
            if let Err(err) = session.close() {
                error!(session = session.id(), error = %err, "session close failed");
            }
        }
    }

    fn open(&self, stream: &Stream) -> framewire_session::Result<Session> {
        let session = Session::new(stream.try_clone()?)?;
        if let Err(err) = register_demo_messages(session.registry()) {
            error!(error = %err, "demo message registration failed");
        }
        session.add_observer(Arc::clone(&self.observer));
        {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.retain(Session::is_receiving);
            sessions.push(session.clone());
        }
        session.start()?;
        Ok(session)
    }
}

impl ListenerObserver for SessionAcceptor {
    fn on_started(&self, listener: &Listener) {
        info!(addr = %listener.local_addr(), "listening");
    }

    fn on_stopped(&self, listener: &Listener) {
        info!(addr = %listener.local_addr(), "stopped listening");
    }

    fn on_request(&self, _listener: &Listener, stream: &Stream) {
        match self.open(stream) {
            Ok(session) => info!(session = session.id(), peer = ?session.peer_addr(), "session opened"),
            Err(err) => error!(error = %err, "failed to open session"),
        }
    }
}
