use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use framewire::demo::{register_demo_messages, TextMessage};
use framewire_codec::Message;
use framewire_session::{Session, SessionConfig, SessionObserver};
use tracing::{debug, warn};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_message, MessageOutput, OutputFormat};

/// Forwards replies until the session stops, then drops the sender so the
/// waiting side sees a disconnect.
struct Reply {
    tx: Mutex<Option<Sender<MessageOutput>>>,
}

impl SessionObserver for Reply {
    fn on_stopped(&self, session: &Session) {
        debug!(session = session.id(), "session stopped while waiting for a reply");
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn on_received(&self, session: &Session, message: &dyn Message) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = tx.as_ref() {
            if tx.send(MessageOutput::describe(session, message)).is_err() {
                debug!(session = session.id(), "reply receiver gone");
            }
        }
    }
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let config = SessionConfig {
        connect_timeout: Some(connect_timeout),
        ..SessionConfig::default()
    };

    let session = Session::connect_with_config(&args.host, args.port, config)
        .map_err(|err| session_error("connect failed", err))?;
    register_demo_messages(session.registry())
        .map_err(|err| CliError::new(INTERNAL, format!("registration failed: {err}")))?;

    let (tx, rx) = mpsc::channel();
    if args.wait {
        session.add_observer(Arc::new(Reply {
            tx: Mutex::new(Some(tx)),
        }));
        session
            .start()
            .map_err(|err| session_error("start failed", err))?;
    }

    let message = TextMessage::new(args.sender, args.text);
    let sequence = session
        .send(&message)
        .map_err(|err| session_error("send failed", err))?;
    debug!(sequence, peer = ?session.peer_addr(), "sent");

    let result = if args.wait {
        match rx.recv_timeout(wait_timeout) {
            Ok(out) => {
                print_message(&out, format);
                Ok(SUCCESS)
            }
            Err(RecvTimeoutError::Timeout) => Err(CliError::new(
                TIMEOUT,
                format!("no reply within {}ms", wait_timeout.as_millis()),
            )),
            Err(RecvTimeoutError::Disconnected) => Err(CliError::new(
                FAILURE,
                "session stopped before a reply arrived",
            )),
        }
    } else {
        Ok(SUCCESS)
    };

    if let Err(err) = session.close() {
        warn!(error = %err, "session close failed");
    }
    result
}
