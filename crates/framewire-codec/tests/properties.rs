//! Property-based tests for the frame codec.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Cursor;

use bytes::BytesMut;
use framewire_codec::{
    encode_frame, FrameReader, FrameWriter, Message, MessageType, Registry, Result, WireReader,
    WireWriter, DEFAULT_MAX_PAYLOAD, HEAD,
};
use proptest::prelude::*;

#[derive(Debug, Default, Clone, PartialEq)]
struct Sample {
    flag: bool,
    tiny: i8,
    short: i16,
    int: i32,
    long: i64,
    single_bits: u32,
    double_bits: u64,
    code_unit: u16,
    blob: Vec<u8>,
    text: String,
}

impl Message for Sample {
    fn message_type(&self) -> i32 {
        Self::TYPE_ID
    }

    fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
        out.write_bool(self.flag);
        out.write_i8(self.tiny);
        out.write_i16(self.short);
        out.write_i32(self.int);
        out.write_i64(self.long);
        out.write_f32(f32::from_bits(self.single_bits));
        out.write_f64(f64::from_bits(self.double_bits));
        out.write_char(self.code_unit);
        out.write_bytes(&self.blob)?;
        out.write_str(&self.text)
    }

    fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
        self.flag = input.read_bool()?;
        self.tiny = input.read_i8()?;
        self.short = input.read_i16()?;
        self.int = input.read_i32()?;
        self.long = input.read_i64()?;
        self.single_bits = input.read_f32()?.to_bits();
        self.double_bits = input.read_f64()?.to_bits();
        self.code_unit = input.read_char()?;
        self.blob = input.read_bytes()?;
        self.text = input.read_string()?;
        Ok(())
    }
}

impl MessageType for Sample {
    const TYPE_ID: i32 = 4242;
}

prop_compose! {
    fn sample()(
        flag in any::<bool>(),
        tiny in any::<i8>(),
        short in any::<i16>(),
        int in any::<i32>(),
        long in any::<i64>(),
        single_bits in any::<u32>(),
        double_bits in any::<u64>(),
        code_unit in any::<u16>(),
        blob in prop::collection::vec(any::<u8>(), 0..256),
        text in ".{0,64}",
    ) -> Sample {
        Sample { flag, tiny, short, int, long, single_bits, double_bits, code_unit, blob, text }
    }
}

fn registry() -> Registry {
    let registry = Registry::new();
    registry.register::<Sample>().expect("register sample");
    registry
}

fn read_sample(reader: &mut FrameReader<Cursor<Vec<u8>>>, registry: &Registry) -> Sample {
    let message = reader
        .read_message(&[registry])
        .expect("read should succeed")
        .expect("type should resolve");
    *message.downcast::<Sample>().expect("should be a sample")
}

// Property: every field survives a write/read cycle, floats by bit pattern
proptest! {
    #[test]
    fn prop_message_roundtrip(value in sample()) {
        let registry = registry();
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_message(&value).unwrap();

        let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
        let decoded = read_sample(&mut reader, &registry);

        prop_assert_eq!(decoded, value);
        prop_assert_eq!(reader.stats().snapshot().anomalies(), 0);
    }
}

// Property: N writes carry sequence numbers 0..N with no gaps
proptest! {
    #[test]
    fn prop_sequences_are_dense(values in prop::collection::vec(sample(), 1..16)) {
        let mut writer = FrameWriter::new(Vec::new());
        for (expected, value) in values.iter().enumerate() {
            prop_assert_eq!(writer.write_message(value).unwrap(), expected as u64);
        }
        prop_assert_eq!(writer.stats().sent(), values.len() as u64);

        let registry = registry();
        let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
        for value in &values {
            prop_assert_eq!(&read_sample(&mut reader, &registry), value);
        }
        prop_assert_eq!(reader.stats().snapshot().sequence_mismatches, 0);
    }
}

// Property: garbage without a head marker before a frame is skipped exactly
proptest! {
    #[test]
    fn prop_resync_skips_garbage(
        garbage in prop::collection::vec(any::<u8>(), 1..64),
        first in sample(),
        second in sample(),
    ) {
        prop_assume!(!garbage.windows(HEAD.len()).any(|window| window == HEAD));

        let mut wire = BytesMut::new();
        encode_frame(0, &first, &mut wire, DEFAULT_MAX_PAYLOAD).unwrap();
        wire.extend_from_slice(&garbage);
        encode_frame(1, &second, &mut wire, DEFAULT_MAX_PAYLOAD).unwrap();

        let registry = registry();
        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        prop_assert_eq!(read_sample(&mut reader, &registry), first);
        prop_assert_eq!(read_sample(&mut reader, &registry), second);

        let stats = reader.stats().snapshot();
        prop_assert_eq!(stats.resyncs, 1);
        prop_assert_eq!(stats.discarded_bytes, garbage.len() as u64);
    }
}
