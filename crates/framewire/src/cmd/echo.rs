use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use framewire_codec::Message;
use framewire_session::{Listener, ListenerConfig, Session, SessionObserver};
use tracing::{debug, info, warn};

use crate::cmd::accept::SessionAcceptor;
use crate::cmd::{install_ctrlc_handler, EchoArgs, POLL_INTERVAL};
use crate::exit::{session_error, CliResult, SUCCESS};

/// Sends every received message straight back on the session it arrived on.
pub struct EchoBack;

impl SessionObserver for EchoBack {
    fn on_stopped(&self, session: &Session) {
        info!(session = session.id(), echoed = session.out_count(), "session stopped");
    }

    fn on_received(&self, session: &Session, message: &dyn Message) {
        match session.send(message) {
            Ok(sequence) => debug!(
                session = session.id(),
                sequence,
                type_id = message.message_type(),
                "echoed"
            ),
            Err(err) => warn!(session = session.id(), error = %err, "echo failed"),
        }
    }
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let listener = Listener::bind_addr(
        SocketAddr::new(args.bind, args.port),
        ListenerConfig::default(),
    )
    .map_err(|err| session_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let acceptor = Arc::new(SessionAcceptor::new(Arc::new(EchoBack)));
    listener.add_observer(acceptor.clone());
    listener
        .start()
        .map_err(|err| session_error("start failed", err))?;

    while running.load(Ordering::SeqCst) && listener.is_accepting() {
        std::thread::sleep(POLL_INTERVAL);
    }

    listener
        .close()
        .map_err(|err| session_error("close failed", err))?;
    acceptor.close_all();

    Ok(SUCCESS)
}
