use std::any::Any;
use std::fmt;

use crate::error::Result;
use crate::wire::{WireReader, WireWriter};

/// Upcast helper so registered messages can be downcast after decoding.
///
/// Implemented for every `'static` type; there is no need to implement it
/// by hand.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A typed, self-encoding unit of application data carried in a frame.
///
/// `encode` and `decode` must be exact mirrors: whatever `encode` writes,
/// `decode` reads back in the same order. The payload is self-delimiting;
/// nothing on the wire records its length.
pub trait Message: AsAny + Send + Sync + fmt::Debug {
    /// The wire-level type identifier written before the payload.
    fn message_type(&self) -> i32;

    /// Write this message's fields.
    fn encode(&self, out: &mut WireWriter<'_>) -> Result<()>;

    /// Populate this (default-constructed) message from the wire.
    fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()>;
}

/// A message type that can be registered and built from nothing.
///
/// `TYPE_ID` must equal what [`Message::message_type`] returns.
pub trait MessageType: Message + Default {
    const TYPE_ID: i32;
}

impl dyn Message {
    /// True if the concrete message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the concrete message.
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete message.
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> {
        <dyn Message as AsAny>::into_any(self).downcast::<T>().ok()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Message types shared by the crate's unit tests.

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Note {
        pub id: i64,
        pub text: String,
    }

    impl Message for Note {
        fn message_type(&self) -> i32 {
            Self::TYPE_ID
        }

        fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
            out.write_i64(self.id);
            out.write_str(&self.text)
        }

        fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
            self.id = input.read_i64()?;
            self.text = input.read_string()?;
            Ok(())
        }
    }

    impl MessageType for Note {
        const TYPE_ID: i32 = 7;
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct Reading {
        pub sensor: i16,
        pub value: f64,
        pub ok: bool,
    }

    impl Message for Reading {
        fn message_type(&self) -> i32 {
            Self::TYPE_ID
        }

        fn encode(&self, out: &mut WireWriter<'_>) -> Result<()> {
            out.write_i16(self.sensor);
            out.write_f64(self.value);
            out.write_bool(self.ok);
            Ok(())
        }

        fn decode(&mut self, input: &mut WireReader<'_>) -> Result<()> {
            self.sensor = input.read_i16()?;
            self.value = input.read_f64()?;
            self.ok = input.read_bool()?;
            Ok(())
        }
    }

    impl MessageType for Reading {
        const TYPE_ID: i32 = 8;
    }
}
