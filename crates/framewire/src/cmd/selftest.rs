use std::net::{Ipv4Addr, SocketAddr};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use framewire::demo::{register_demo_messages, ProbeMessage, TextMessage};
use framewire_codec::Message;
use framewire_session::{Listener, ListenerConfig, Session, SessionObserver};
use tracing::{debug, info, warn};

use crate::cmd::accept::SessionAcceptor;
use crate::cmd::echo::EchoBack;
use crate::cmd::{parse_duration, SelftestArgs};
use crate::exit::{session_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS};
use crate::output::{print_report, OutputFormat, SelftestReport};

const SENDER: &str = "selftest";

/// What came back for one echoed message.
#[derive(Debug)]
enum Echoed {
    Probe { intact: bool },
    Text { body: String },
    Other(i32),
}

struct Verify {
    tx: Mutex<Sender<Echoed>>,
}

impl SessionObserver for Verify {
    fn on_received(&self, session: &Session, message: &dyn Message) {
        let echoed = if let Some(probe) = message.downcast_ref::<ProbeMessage>() {
            if !probe.is_intact() {
                warn!(mismatches = ?probe.mismatches(), "probe came back damaged");
            }
            Echoed::Probe {
                intact: probe.is_intact(),
            }
        } else if let Some(text) = message.downcast_ref::<TextMessage>() {
            Echoed::Text {
                body: text.body.clone(),
            }
        } else {
            Echoed::Other(message.message_type())
        };
        let sent = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(echoed);
        if sent.is_err() {
            debug!(session = session.id(), "verifier gone, echo dropped");
        }
    }
}

fn round_body(round: u64) -> String {
    format!("round {round}")
}

/// Start an echo listener on loopback, push `rounds` probe and text pairs
/// through it, and check what comes back.
pub fn run(args: SelftestArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let started = Instant::now();

    let listener = Listener::bind_addr(
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
        ListenerConfig::default(),
    )
    .map_err(|err| session_error("bind failed", err))?;
    let acceptor = Arc::new(SessionAcceptor::new(Arc::new(EchoBack)));
    listener.add_observer(acceptor.clone());
    listener
        .start()
        .map_err(|err| session_error("start failed", err))?;

    let port = listener.local_addr().port();
    let client = Session::connect("127.0.0.1", port)
        .map_err(|err| session_error("connect failed", err))?;
    register_demo_messages(client.registry())
        .map_err(|err| CliError::new(INTERNAL, format!("registration failed: {err}")))?;

    let (tx, rx) = mpsc::channel();
    client.add_observer(Arc::new(Verify { tx: Mutex::new(tx) }));
    client
        .start()
        .map_err(|err| session_error("start failed", err))?;

    for round in 0..args.rounds {
        client
            .send(&ProbeMessage::generate())
            .map_err(|err| session_error("send failed", err))?;
        client
            .send(&TextMessage::new(SENDER, round_body(round)))
            .map_err(|err| session_error("send failed", err))?;
    }

    let expected = args.rounds.saturating_mul(2);
    let deadline = started + timeout;
    let mut received = 0u64;
    let mut intact = 0u64;
    let mut next_round = 0u64;
    while received < expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let Ok(echoed) = rx.recv_timeout(remaining) else {
            warn!(received, expected, "timed out waiting for echoes");
            break;
        };
        received += 1;
        match echoed {
            Echoed::Probe { intact: true } => intact += 1,
            Echoed::Probe { intact: false } => {}
            Echoed::Text { body } => {
                if body == round_body(next_round) {
                    intact += 1;
                } else {
                    warn!(expected = %round_body(next_round), got = %body, "text came back out of order");
                }
                next_round += 1;
            }
            Echoed::Other(type_id) => warn!(type_id, "unexpected message type echoed"),
        }
    }

    if let Err(err) = client.close() {
        warn!(error = %err, "client close failed");
    }
    if let Err(err) = listener.close() {
        warn!(error = %err, "listener close failed");
    }
    acceptor.close_all();

    let servers = acceptor.sessions();
    let server_received: u64 = servers.iter().map(Session::in_count).sum();
    let anomalies = client.stats().anomalies()
        + servers
            .iter()
            .map(|session| session.stats().anomalies())
            .sum::<u64>();

    let report = SelftestReport {
        rounds: args.rounds,
        sent: client.out_count(),
        received,
        intact,
        server_received,
        anomalies,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        passed: client.out_count() == expected
            && received == expected
            && intact == expected
            && server_received == expected
            && anomalies == 0,
    };
    info!(passed = report.passed, elapsed_ms = report.elapsed_ms, "selftest finished");

    print_report(&report, format);
    Ok(if report.passed { SUCCESS } else { DATA_INVALID })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_bodies_are_distinct() {
        assert_eq!(round_body(0), "round 0");
        assert_ne!(round_body(1), round_body(2));
    }
}
