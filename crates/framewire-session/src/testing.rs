//! Shared fixtures for the crate's unit tests.

use std::net::SocketAddr;
use std::sync::mpsc;
use std::sync::Arc;

use framewire_codec::{Message, MessageType, Result, WireReader, WireWriter};
use framewire_transport::Stream;

use crate::listener::{Listener, ListenerObserver};
use crate::session::{Session, SessionObserver};

pub fn loopback() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 0))
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Ping {
    pub seq: i32,
    pub note: String,
}

impl Message for Ping {
    fn message_type(&self) -> i32 {
        Self::TYPE_ID
    }

    fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
        out.write_i32(self.seq);
        out.write_str(&self.note)
    }

    fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.seq = input.read_i32()?;
        self.note = input.read_string()?;
        Ok(())
    }
}

impl MessageType for Ping {
    const TYPE_ID: i32 = 100;
}

pub fn ping(seq: i32) -> Ping {
    Ping {
        seq,
        note: format!("ping-{seq}"),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Started,
    Stopped,
    Request(Option<SocketAddr>),
    Ping(Ping),
    Other(i32),
}

/// Forwards every callback into a channel.
pub struct Recorder {
    events: mpsc::Sender<Event>,
}

impl Recorder {
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (events, rx) = mpsc::channel();
        (Arc::new(Self { events }), rx)
    }

    fn emit(&self, event: Event) {
        let _ = self.events.send(event);
    }
}

impl ListenerObserver for Recorder {
    fn on_started(&self, _listener: &Listener) {
        self.emit(Event::Started);
    }

    fn on_stopped(&self, _listener: &Listener) {
        self.emit(Event::Stopped);
    }

    fn on_request(&self, _listener: &Listener, stream: &Stream) {
        self.emit(Event::Request(stream.peer_addr()));
    }
}

impl SessionObserver for Recorder {
    fn on_started(&self, _session: &Session) {
        self.emit(Event::Started);
    }

    fn on_stopped(&self, _session: &Session) {
        self.emit(Event::Stopped);
    }

    fn on_received(&self, _session: &Session, message: &dyn Message) {
        match message.downcast_ref::<Ping>() {
            Some(ping) => self.emit(Event::Ping(ping.clone())),
            None => self.emit(Event::Other(message.message_type())),
        }
    }
}
