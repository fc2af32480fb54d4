use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use framewire_transport::{Stream, TcpTransport};
use tracing::debug;

use crate::codec::FrameConfig;
use crate::error::Result;
use crate::message::Message;
use crate::reader::FrameReader;
use crate::registry::Registry;
use crate::stats::{FrameStats, FrameStatsSnapshot};
use crate::writer::FrameWriter;

/// A framed, sequenced message connection over one stream.
///
/// Reads and writes are serialized independently: one writer and one reader
/// may be active at the same time, but two writers (or two readers) never
/// overlap. Incoming type ids are resolved against the connection's own
/// registry first, then against the fallback registry, which is the process
/// global one unless replaced with [`Connection::with_registry`].
pub struct Connection {
    reader: Mutex<FrameReader<Stream>>,
    writer: Mutex<FrameWriter<Stream>>,
    control: Stream,
    registry: Registry,
    fallback: Arc<Registry>,
    stats: Arc<FrameStats>,
}

impl Connection {
    /// Wrap an established stream with default configuration.
    pub fn new(stream: Stream) -> Result<Self> {
        Self::with_config(stream, FrameConfig::default())
    }

    /// Wrap an established stream with explicit configuration.
    pub fn with_config(stream: Stream, config: FrameConfig) -> Result<Self> {
        let stats = Arc::new(FrameStats::new());
        let reader = FrameReader::for_stream(stream.try_clone()?, config.clone(), Arc::clone(&stats))?;
        let control = stream.try_clone()?;
        let writer = FrameWriter::for_stream(stream, config, Arc::clone(&stats))?;

        debug!(
            transport = control.transport_name(),
            peer = ?control.peer_addr(),
            "connection established"
        );

        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            control,
            registry: Registry::new(),
            fallback: Registry::global(),
            stats,
        })
    }

    /// Connect to `host:port` over TCP and wrap the stream.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::new(TcpTransport::connect(host, port)?)
    }

    /// Replace the fallback registry consulted after the local one.
    pub fn with_registry(mut self, fallback: Arc<Registry>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Frame and send one message. Returns its sequence number.
    pub fn write(&self, message: &dyn Message) -> Result<u64> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_message(message)
    }

    /// Read the next message (blocking).
    ///
    /// `Ok(None)` means the frame carried a type id that neither registry
    /// knows; its bytes have been skipped.
    pub fn read(&self) -> Result<Option<Box<dyn Message>>> {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_message(&[&self.registry, &self.fallback])
    }

    /// The connection-local registry, consulted before the fallback.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn fallback_registry(&self) -> &Arc<Registry> {
        &self.fallback
    }

    /// Frames read so far. Does not take the read lock.
    pub fn in_count(&self) -> u64 {
        self.stats.received()
    }

    /// Frames written so far. Does not take the write lock.
    pub fn out_count(&self) -> u64 {
        self.stats.sent()
    }

    pub fn stats(&self) -> FrameStatsSnapshot {
        self.stats.snapshot()
    }

    /// Shut the stream down in both directions.
    ///
    /// A read or write blocked on another thread fails promptly afterwards.
    pub fn shutdown(&self) -> Result<()> {
        self.control.shutdown()?;
        Ok(())
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.control.peer_addr()
    }

    pub fn transport_name(&self) -> &'static str {
        self.control.transport_name()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("stream", &self.control)
            .field("registry", &self.registry)
            .field("fallback", &self.fallback.scope())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::collections::HashSet;
    use std::io::Read;

    use super::*;
    use crate::codec::{HEAD, TAIL};
    use crate::error::FrameError;
    use crate::message::testing::{Note, Reading};
    use crate::message::MessageType;

    fn pair() -> (Connection, Connection) {
        let (left, right) = Stream::pair().unwrap();
        let left = Connection::new(left).unwrap();
        let right = Connection::new(right).unwrap();
        for conn in [&left, &right] {
            conn.registry().register::<Note>().unwrap();
            conn.registry().register::<Reading>().unwrap();
        }
        (left, right)
    }

    #[test]
    fn round_trip_preserves_float_bits() {
        let (left, right) = pair();
        let sent = Reading {
            sensor: i16::MIN,
            value: -0.0,
            ok: true,
        };
        assert_eq!(left.write(&sent).unwrap(), 0);

        let received = right.read().unwrap().unwrap();
        let reading = received.downcast_ref::<Reading>().unwrap();
        assert_eq!(reading.sensor, i16::MIN);
        assert_eq!(reading.value.to_bits(), (-0.0f64).to_bits());
        assert!(reading.ok);
    }

    #[test]
    fn counters_track_each_direction() {
        let (left, right) = pair();
        for i in 0..3 {
            left.write(&Note {
                id: i,
                text: String::new(),
            })
            .unwrap();
        }
        right.write(&Note::default()).unwrap();

        for _ in 0..3 {
            right.read().unwrap().unwrap();
        }
        left.read().unwrap().unwrap();

        assert_eq!(left.out_count(), 3);
        assert_eq!(left.in_count(), 1);
        assert_eq!(right.in_count(), 3);
        assert_eq!(right.out_count(), 1);
        assert_eq!(right.stats().sequence_mismatches, 0);
    }

    #[test]
    fn local_registry_shadows_fallback() {
        let (left, right) = Stream::pair().unwrap();
        let left = Connection::new(left).unwrap();
        let fallback = Arc::new(Registry::scoped("test"));
        fallback.register::<Note>().unwrap();
        let right = Connection::new(right)
            .unwrap()
            .with_registry(Arc::clone(&fallback));

        left.write(&Note {
            id: 11,
            text: "via fallback".to_string(),
        })
        .unwrap();
        let message = right.read().unwrap().unwrap();
        assert!(message.is::<Note>());

        // An unknown id on both registries is skipped, not fatal.
        left.write(&Reading::default()).unwrap();
        left.write(&Note::default()).unwrap();
        assert!(right.read().unwrap().is_none());
        assert!(right.read().unwrap().unwrap().is::<Note>());
        assert_eq!(right.stats().unknown_types, 1);
        assert!(Arc::ptr_eq(right.fallback_registry(), &fallback));
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        const WRITERS: i64 = 8;
        const PER_WRITER: i64 = 25;

        let (raw_left, mut raw_right) = Stream::pair().unwrap();
        let conn = Arc::new(Connection::new(raw_left).unwrap());

        let handles: Vec<_> = (0..WRITERS)
            .map(|w| {
                let conn = Arc::clone(&conn);
                std::thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        conn.write(&Note {
                            id: w * 1000 + i,
                            text: format!("writer-{w}-{i}-{}", "x".repeat(i as usize)),
                        })
                        .unwrap();
                    }
                })
            })
            .collect();

        let total = (WRITERS * PER_WRITER) as usize;
        let reader = std::thread::spawn(move || {
            let mut frames = Vec::with_capacity(total);
            for _ in 0..total {
                let mut head = [0u8; 16];
                raw_right.read_exact(&mut head).unwrap();
                assert_eq!(head[..4], HEAD);
                let seq = u64::from_be_bytes(head[4..12].try_into().unwrap());
                assert_eq!(i32::from_be_bytes(head[12..16].try_into().unwrap()), Note::TYPE_ID);

                let mut id = [0u8; 8];
                raw_right.read_exact(&mut id).unwrap();
                let mut len = [0u8; 4];
                raw_right.read_exact(&mut len).unwrap();
                let mut text = vec![0u8; i32::from_be_bytes(len) as usize];
                raw_right.read_exact(&mut text).unwrap();
                let mut tail = [0u8; 4];
                raw_right.read_exact(&mut tail).unwrap();
                assert_eq!(tail, TAIL);

                frames.push((seq, i64::from_be_bytes(id), String::from_utf8(text).unwrap()));
            }
            frames
        });

        for handle in handles {
            handle.join().unwrap();
        }
        let frames = reader.join().unwrap();

        let sequences: Vec<u64> = frames.iter().map(|(seq, _, _)| *seq).collect();
        assert_eq!(sequences, (0..total as u64).collect::<Vec<_>>());

        let ids: HashSet<i64> = frames.iter().map(|(_, id, _)| *id).collect();
        assert_eq!(ids.len(), total);
        for (_, id, text) in &frames {
            let (w, i) = (id / 1000, id % 1000);
            assert!(text.starts_with(&format!("writer-{w}-{i}-")));
        }
        assert_eq!(conn.out_count(), total as u64);
    }

    #[test]
    fn shutdown_unblocks_reader() {
        let (left, _right) = pair();
        let left = Arc::new(left);
        let blocked = {
            let left = Arc::clone(&left);
            std::thread::spawn(move || left.read())
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        left.shutdown().unwrap();

        let err = blocked.join().unwrap().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_after_peer_drop_is_transport_error() {
        let (left, right) = pair();
        drop(right);

        let mut result = Ok(0);
        for _ in 0..16 {
            result = left.write(&Note::default());
            if result.is_err() {
                break;
            }
        }
        assert!(result.unwrap_err().is_transport());
    }

    #[test]
    fn connect_over_tcp() {
        let transport = TcpTransport::bind_addr("127.0.0.1:0".parse().unwrap()).unwrap();
        let port = transport.local_addr().port();

        let client = Connection::connect("127.0.0.1", port).unwrap();
        let server = Connection::new(transport.accept().unwrap()).unwrap();
        server.registry().register::<Note>().unwrap();

        client
            .write(&Note {
                id: 5,
                text: "over tcp".to_string(),
            })
            .unwrap();
        let message = server.read().unwrap().unwrap();
        assert_eq!(message.downcast_ref::<Note>().unwrap().text, "over tcp");
        assert_eq!(client.transport_name(), "tcp");
        assert!(client.peer_addr().is_some());
    }
}
