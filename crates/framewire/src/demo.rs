//! Demonstration message types.
//!
//! [`TextMessage`] carries a line of chat. [`ProbeMessage`] exercises every
//! wire primitive with fixed value tables and random strings paired with
//! their SHA-256 digests, so a receiver can check that a payload arrived
//! intact.

use std::time::{SystemTime, UNIX_EPOCH};

use framewire_codec::{
    Message, MessageType, Registration, Registry, RegistryError, Result, WireReader, WireWriter,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Register every demonstration type in one batch.
pub fn register_demo_messages(registry: &Registry) -> std::result::Result<(), RegistryError> {
    registry.register_all(&[
        Registration::of::<TextMessage>(),
        Registration::of::<ProbeMessage>(),
    ])
}

/// A line of text from a named sender.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub sender: String,
    pub body: String,
    /// Milliseconds since the Unix epoch, set by the sender.
    pub timestamp: i64,
}

impl TextMessage {
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
            timestamp: now_millis(),
        }
    }
}

impl Message for TextMessage {
    fn message_type(&self) -> i32 {
        Self::TYPE_ID
    }

    fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
        out.write_str(&self.sender)?;
        out.write_str(&self.body)?;
        out.write_i64(self.timestamp);
        Ok(())
    }

    fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.sender = input.read_string()?;
        self.body = input.read_string()?;
        self.timestamp = input.read_i64()?;
        Ok(())
    }
}

impl MessageType for TextMessage {
    const TYPE_ID: i32 = 1;
}

const BOOLS: [bool; 6] = [true, false, true, false, false, true];
const BYTES: [i8; 6] = [1, 2, 12, 24, 120, 127];
const CHARS: [u16; 5] = [b'A' as u16, b'z' as u16, b'q' as u16, b't' as u16, b'W' as u16];
const FLOATS: [f32; 5] = [0.12, 0.14, 8.19, 10.12, std::f32::consts::PI];
const INTS: [i32; 6] = [4, 5, 0, 12, i32::MAX, i32::MIN];
const SHORTS: [i16; 5] = [i16::MAX, i16::MIN, 12, 39, 20];

/// Number of random strings a probe carries.
pub const PROBE_SAMPLES: usize = 3;

// acos(pi) is NaN; it checks that NaN payloads survive by bit pattern.
fn doubles() -> [f64; 4] {
    use std::f64::consts::{E, PI};
    [PI, E, PI.acos(), PI.exp()]
}

/// A self-verifying payload covering every wire primitive.
///
/// Decoding never fails on a content mismatch: every field is consumed and
/// each mismatch is logged and recorded, see [`ProbeMessage::mismatches`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeMessage {
    samples: Vec<String>,
    mismatches: Vec<String>,
}

impl ProbeMessage {
    /// A probe carrying freshly generated random decimal strings.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let samples: Vec<String> = (0..PROBE_SAMPLES)
            .map(|_| {
                let len: usize = rng.random_range(250..=302);
                (0..len)
                    .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
                    .collect::<String>()
            })
            .collect();
        Self {
            samples,
            mismatches: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Fields that did not match on decode. Empty means intact.
    pub fn mismatches(&self) -> &[String] {
        &self.mismatches
    }

    pub fn is_intact(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn check(&mut self, field: &str, index: usize, ok: bool) {
        if !ok {
            warn!(field, index, "probe field mismatch");
            self.mismatches.push(format!("{field}[{index}]"));
        }
    }
}

impl Default for ProbeMessage {
    fn default() -> Self {
        Self {
            samples: vec![String::new(); PROBE_SAMPLES],
            mismatches: Vec::new(),
        }
    }
}

impl Message for ProbeMessage {
    fn message_type(&self) -> i32 {
        Self::TYPE_ID
    }

    fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
        BOOLS.iter().for_each(|v| out.write_bool(*v));
        BYTES.iter().for_each(|v| out.write_i8(*v));
        CHARS.iter().for_each(|v| out.write_char(*v));
        doubles().iter().for_each(|v| out.write_f64(*v));
        FLOATS.iter().for_each(|v| out.write_f32(*v));
        INTS.iter().for_each(|v| out.write_i32(*v));
        SHORTS.iter().for_each(|v| out.write_i16(*v));

        for index in 0..PROBE_SAMPLES {
            let sample = self.samples.get(index).map(String::as_str).unwrap_or_default();
            out.write_str(sample)?;
            out.write_str(&sha256_hex(sample))?;
        }
        Ok(())
    }

    fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.mismatches.clear();

        for (i, v) in BOOLS.iter().enumerate() {
            let ok = input.read_bool()? == *v;
            self.check("bool", i, ok);
        }
        for (i, v) in BYTES.iter().enumerate() {
            let ok = input.read_i8()? == *v;
            self.check("byte", i, ok);
        }
        for (i, v) in CHARS.iter().enumerate() {
            let ok = input.read_char()? == *v;
            self.check("char", i, ok);
        }
        for (i, v) in doubles().iter().enumerate() {
            let ok = input.read_f64()?.to_bits() == v.to_bits();
            self.check("double", i, ok);
        }
        for (i, v) in FLOATS.iter().enumerate() {
            let ok = input.read_f32()?.to_bits() == v.to_bits();
            self.check("float", i, ok);
        }
        for (i, v) in INTS.iter().enumerate() {
            let ok = input.read_i32()? == *v;
            self.check("int", i, ok);
        }
        for (i, v) in SHORTS.iter().enumerate() {
            let ok = input.read_i16()? == *v;
            self.check("short", i, ok);
        }

        self.samples.clear();
        for i in 0..PROBE_SAMPLES {
            let sample = input.read_string()?;
            let digest = input.read_string()?;
            let ok = sha256_hex(&sample) == digest;
            self.check("string", i, ok);
            self.samples.push(sample);
        }
        Ok(())
    }
}

impl MessageType for ProbeMessage {
    const TYPE_ID: i32 = 1234;
}

/// Lowercase hex SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
