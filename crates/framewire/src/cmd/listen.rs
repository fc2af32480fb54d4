use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use framewire_codec::Message;
use framewire_session::{Listener, ListenerConfig, Session, SessionObserver};
use tracing::{debug, info};

use crate::cmd::accept::SessionAcceptor;
use crate::cmd::{install_ctrlc_handler, ListenArgs, POLL_INTERVAL};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_message, MessageOutput, OutputFormat};

/// Hands every received message to the foreground thread for printing.
struct Forward {
    tx: Mutex<Sender<MessageOutput>>,
}

impl Forward {
    fn new(tx: Sender<MessageOutput>) -> Self {
        Self { tx: Mutex::new(tx) }
    }
}

impl SessionObserver for Forward {
    fn on_stopped(&self, session: &Session) {
        info!(session = session.id(), received = session.in_count(), "session stopped");
    }

    fn on_received(&self, session: &Session, message: &dyn Message) {
        let out = MessageOutput::describe(session, message);
        let sent = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(out);
        if sent.is_err() {
            debug!(session = session.id(), "printer gone, message dropped");
        }
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = Listener::bind_addr(
        SocketAddr::new(args.bind, args.port),
        ListenerConfig::default(),
    )
    .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel();
    let acceptor = Arc::new(SessionAcceptor::new(Arc::new(Forward::new(tx))));
    listener.add_observer(acceptor.clone());
    listener
        .start()
        .map_err(|err| session_error("start failed", err))?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(out) => {
                print_message(&out, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    listener
        .close()
        .map_err(|err| session_error("close failed", err))?;
    acceptor.close_all();

    Ok(SUCCESS)
}
