//! Request and response envelopes.
//!
//! Both envelopes carry application values as opaque, pre-encoded bytes;
//! neither the framing layer nor the server ever looks inside them.

use std::fmt;

use serde::de::{
    self, DeserializeOwned, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor,
};
use serde::{Deserialize, Deserializer, Serialize};
use xxrpc_frame::Poolable;

use crate::codec::{Codec, DecodeInPlace};
use crate::error::CodecError;

/// A call to `service.method` with codec-encoded parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub service: String,
    pub method: String,
    #[serde(with = "serde_bytes", default)]
    pub params: Vec<u8>,
}

impl Request {
    pub fn new(service: impl Into<String>, method: impl Into<String>, params: Vec<u8>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            params,
        }
    }

    /// The `Service.Method` key this request dispatches to.
    pub fn key(&self) -> String {
        format!("{}.{}", self.service, self.method)
    }
}

impl Poolable for Request {
    fn reset(&mut self) {
        self.service.clear();
        self.method.clear();
        self.params.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.service.capacity() + self.method.capacity() + self.params.capacity()
    }
}

impl DecodeInPlace for Request {
    fn decode_in_place<'de, D: Deserializer<'de>>(
        &mut self,
        deserializer: D,
    ) -> Result<(), D::Error> {
        self.reset();
        deserializer.deserialize_struct("Request", REQUEST_FIELDS, RequestVisitor(self))
    }
}

const REQUEST_FIELDS: &[&str] = &["service", "method", "params"];

enum RequestField {
    Service,
    Method,
    Params,
    Other,
}

impl<'de> Deserialize<'de> for RequestField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldVisitor;

        impl Visitor<'_> for FieldVisitor {
            type Value = RequestField;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a request field name")
            }

            fn visit_u64<E: de::Error>(self, index: u64) -> Result<RequestField, E> {
                Ok(match index {
                    0 => RequestField::Service,
                    1 => RequestField::Method,
                    2 => RequestField::Params,
                    _ => RequestField::Other,
                })
            }

            fn visit_str<E: de::Error>(self, name: &str) -> Result<RequestField, E> {
                self.visit_bytes(name.as_bytes())
            }

            fn visit_bytes<E: de::Error>(self, name: &[u8]) -> Result<RequestField, E> {
                Ok(match name {
                    b"service" => RequestField::Service,
                    b"method" => RequestField::Method,
                    b"params" => RequestField::Params,
                    _ => RequestField::Other,
                })
            }
        }

        deserializer.deserialize_identifier(FieldVisitor)
    }
}

/// Fills a reset [`Request`] field by field.
struct RequestVisitor<'a>(&'a mut Request);

impl<'de> Visitor<'de> for RequestVisitor<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("struct Request")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let (mut service, mut method) = (false, false);
        while let Some(field) = map.next_key::<RequestField>()? {
            match field {
                RequestField::Service => {
                    map.next_value_seed(StringInto(&mut self.0.service))?;
                    service = true;
                }
                RequestField::Method => {
                    map.next_value_seed(StringInto(&mut self.0.method))?;
                    method = true;
                }
                RequestField::Params => map.next_value_seed(BytesInto(&mut self.0.params))?,
                RequestField::Other => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        if !service {
            return Err(de::Error::missing_field("service"));
        }
        if !method {
            return Err(de::Error::missing_field("method"));
        }
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        if seq.next_element_seed(StringInto(&mut self.0.service))?.is_none() {
            return Err(de::Error::invalid_length(0, &self));
        }
        if seq.next_element_seed(StringInto(&mut self.0.method))?.is_none() {
            return Err(de::Error::invalid_length(1, &self));
        }
        seq.next_element_seed(BytesInto(&mut self.0.params))?;
        Ok(())
    }
}

/// Decodes a string into an existing buffer.
struct StringInto<'a>(&'a mut String);

impl<'de> DeserializeSeed<'de> for StringInto<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_str(self)
    }
}

impl Visitor<'_> for StringInto<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.0.clear();
        self.0.push_str(v);
        Ok(())
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<(), E> {
        let s = std::str::from_utf8(v)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Bytes(v), &self))?;
        self.visit_str(s)
    }
}

/// Decodes a byte string (or a sequence of bytes) into an existing buffer.
struct BytesInto<'a>(&'a mut Vec<u8>);

impl<'de> DeserializeSeed<'de> for BytesInto<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_bytes(self)
    }
}

impl<'de> Visitor<'de> for BytesInto<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte array")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<(), E> {
        self.0.clear();
        self.0.extend_from_slice(v);
        Ok(())
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.visit_bytes(v.as_bytes())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        self.0.clear();
        while let Some(byte) = seq.next_element::<u8>()? {
            self.0.push(byte);
        }
        Ok(())
    }
}

/// Outcome of a call.
///
/// On success `error` is empty and `data` holds the codec-encoded result
/// (possibly empty). On a dispatch or application failure `error` holds the
/// message and `data` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(with = "serde_bytes", default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub error: String,
}

impl Response {
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            data,
            error: String::new(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            data: Vec::new(),
            error: message.into(),
        }
    }

    /// Whether the call failed on the remote side.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Record a failure, discarding any partial result.
    pub fn set_error(&mut self, message: impl std::fmt::Display) {
        use std::fmt::Write;

        self.data.clear();
        self.error.clear();
        let _ = write!(self.error, "{message}");
    }

    /// Decode `data` as `T` with the codec the call was made with.
    pub fn decode<T: DeserializeOwned, C: Codec>(&self, codec: &C) -> Result<T, CodecError> {
        codec.unmarshal(&self.data)
    }
}

impl Poolable for Response {
    fn reset(&mut self) {
        self.data.clear();
        self.error.clear();
    }

    fn retained_bytes(&self) -> usize {
        self.data.capacity() + self.error.capacity()
    }
}

#[cfg(test)]
mod tests {
    use xxrpc_frame::Pool;

    use super::*;
    use crate::codec::JsonCodec;

    #[test]
    fn request_key_joins_service_and_method() {
        let req = Request::new("Echo", "Say", Vec::new());
        assert_eq!(req.key(), "Echo.Say");
    }

    #[test]
    fn set_error_clears_partial_data() {
        let mut resp = Response::ok(b"partial".to_vec());
        resp.set_error("method Nope not found in service Echo");
        assert!(resp.is_error());
        assert!(resp.data.is_empty());
        assert_eq!(resp.error, "method Nope not found in service Echo");
    }

    #[test]
    fn pooled_envelopes_come_back_empty() {
        let requests: Pool<Request> = Pool::new();
        let responses: Pool<Response> = Pool::new();

        let mut req = requests.acquire();
        req.service.push_str("Echo");
        req.method.push_str("Say");
        req.params.extend_from_slice(b"\"hi\"");
        requests.release(req);

        let mut resp = responses.acquire();
        resp.data.extend_from_slice(b"\"HI\"");
        resp.error.push_str("boom");
        responses.release(resp);

        assert_eq!(requests.acquire(), Request::default());
        assert_eq!(responses.acquire(), Response::default());
    }

    #[test]
    fn response_decodes_payload() {
        let codec = JsonCodec;
        let resp = Response::ok(codec.marshal(&"HI").unwrap());
        let value: String = resp.decode(&codec).unwrap();
        assert_eq!(value, "HI");
    }

    #[test]
    fn decode_in_place_replaces_previous_contents() {
        let mut req = Request::new("Stale", "Old", b"left over bytes".to_vec());
        JsonCodec
            .unmarshal_into(br#"{"service":"Echo","method":"Say","extra":[1,2]}"#, &mut req)
            .unwrap();
        assert_eq!(req, Request::new("Echo", "Say", Vec::new()));

        JsonCodec
            .unmarshal_into(br#"["Echo","SayHello",[104,105]]"#, &mut req)
            .unwrap();
        assert_eq!(req, Request::new("Echo", "SayHello", b"hi".to_vec()));
    }

    #[test]
    fn decode_in_place_requires_service_and_method() {
        let mut req = Request::default();
        let err = JsonCodec
            .unmarshal_into(br#"{"method":"Say"}"#, &mut req)
            .unwrap_err();
        assert!(err.to_string().contains("service"), "{err}");
        assert!(JsonCodec.unmarshal_into(br#"{"service":1,"method":"Say"}"#, &mut req).is_err());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let resp: Response = serde_json::from_str("{}").unwrap();
        assert_eq!(resp, Response::default());
        let req: Request = serde_json::from_str(r#"{"service":"A","method":"b"}"#).unwrap();
        assert!(req.params.is_empty());
    }
}
