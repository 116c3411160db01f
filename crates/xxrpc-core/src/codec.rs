//! The serializer boundary.
//!
//! The core never depends on a concrete format. Everything that crosses the
//! wire (envelopes, parameters, results) goes through a [`Codec`]: a pair
//! of symmetric `marshal`/`unmarshal` operations over serde types.

use std::fmt;
use std::str::FromStr;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Serialize;

use crate::error::CodecError;

/// A value that can be decoded over an existing instance, reusing the
/// allocations it already owns.
///
/// Pooled envelopes implement this so that a request decoded into a
/// recycled [`Request`](crate::Request) fills its existing buffers instead
/// of replacing them.
pub trait DecodeInPlace {
    fn decode_in_place<'de, D: Deserializer<'de>>(&mut self, deserializer: D)
        -> Result<(), D::Error>;
}

/// Symmetric serializer for envelopes and application values.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Append the encoding of `value` to `dst`. On error `dst` is left as it
    /// was.
    fn marshal_into<T: Serialize + ?Sized>(
        &self,
        value: &T,
        dst: &mut Vec<u8>,
    ) -> Result<(), CodecError>;

    /// Decode a `T` from `bytes`.
    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError>;

    /// Encode `value` into a fresh buffer.
    fn marshal<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.marshal_into(value, &mut out)?;
        Ok(out)
    }

    /// Decode into an existing value, e.g. one taken from a pool. The
    /// target's buffers are reused.
    fn unmarshal_into<T: DecodeInPlace>(
        &self,
        bytes: &[u8],
        target: &mut T,
    ) -> Result<(), CodecError>;
}

/// JSON via `serde_json`. The default codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal_into<T: Serialize + ?Sized>(
        &self,
        value: &T,
        dst: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        let mark = dst.len();
        serde_json::to_writer(&mut *dst, value).inspect_err(|_| dst.truncate(mark))?;
        Ok(())
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn unmarshal_into<T: DecodeInPlace>(
        &self,
        bytes: &[u8],
        target: &mut T,
    ) -> Result<(), CodecError> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        target.decode_in_place(&mut de)?;
        de.end()?;
        Ok(())
    }
}

/// MessagePack via `rmp-serde`. Structs are encoded as maps so field order
/// does not matter across versions.
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsgPackCodec;

#[cfg(feature = "msgpack")]
impl Codec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn marshal_into<T: Serialize + ?Sized>(
        &self,
        value: &T,
        dst: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        let mark = dst.len();
        rmp_serde::encode::write_named(dst, value).inspect_err(|_| dst.truncate(mark))?;
        Ok(())
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn unmarshal_into<T: DecodeInPlace>(
        &self,
        bytes: &[u8],
        target: &mut T,
    ) -> Result<(), CodecError> {
        let mut de = rmp_serde::Deserializer::from_read_ref(bytes);
        target.decode_in_place(&mut de)?;
        Ok(())
    }
}

/// Codec chosen at runtime, e.g. from a command-line flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CodecKind {
    #[default]
    Json,
    #[cfg(feature = "msgpack")]
    MsgPack,
}

impl Codec for CodecKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Json => JsonCodec.name(),
            #[cfg(feature = "msgpack")]
            Self::MsgPack => MsgPackCodec.name(),
        }
    }

    fn marshal_into<T: Serialize + ?Sized>(
        &self,
        value: &T,
        dst: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        match self {
            Self::Json => JsonCodec.marshal_into(value, dst),
            #[cfg(feature = "msgpack")]
            Self::MsgPack => MsgPackCodec.marshal_into(value, dst),
        }
    }

    fn unmarshal<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        match self {
            Self::Json => JsonCodec.unmarshal(bytes),
            #[cfg(feature = "msgpack")]
            Self::MsgPack => MsgPackCodec.unmarshal(bytes),
        }
    }

    fn unmarshal_into<T: DecodeInPlace>(
        &self,
        bytes: &[u8],
        target: &mut T,
    ) -> Result<(), CodecError> {
        match self {
            Self::Json => JsonCodec.unmarshal_into(bytes, target),
            #[cfg(feature = "msgpack")]
            Self::MsgPack => MsgPackCodec.unmarshal_into(bytes, target),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            #[cfg(feature = "msgpack")]
            "msgpack" | "messagepack" => Ok(Self::MsgPack),
            other => Err(format!("unknown codec '{other}'")),
        }
    }
}
