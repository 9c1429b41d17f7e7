//! Framed codec for the control channel.
//!
//! Uses LengthDelimitedCodec for framing + serde_json for serialization.
//! Each frame is a 4-byte big-endian length followed by one JSON document.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest frame either side may send.
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// Codec that frames messages with length prefix and serializes with JSON.
///
/// Decode failures surface as `io::ErrorKind::InvalidData` so callers can
/// tell a malformed frame apart from a broken socket.
pub struct JsonCodec<T> {
    inner: LengthDelimitedCodec,
    _phantom: PhantomData<T>,
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .length_field_length(4)
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
            _phantom: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Decoder for JsonCodec<T> {
    type Item = T;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(bytes) => {
                tracing::trace!(json_size_bytes = bytes.len(), "Decoding frame");
                let item = serde_json::from_slice(&bytes)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }
}

impl<T: Serialize> Encoder<T> for JsonCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let json_len = json.len();
        tracing::trace!(json_size_bytes = json_len, "Encoding frame");
        if json_len > MAX_FRAME_LENGTH {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "frame too large [bytes:{}, max:{}]",
                    json_len, MAX_FRAME_LENGTH
                ),
            ));
        }
        if json_len > 100_000 {
            tracing::info!(
                json_size_bytes = json_len,
                json_size_kb = json_len / 1024,
                "Large frame being encoded"
            );
        }
        self.inner.encode(Bytes::from(json), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::protocol::{RequestMessage, Response, Target};
    use serde_json::json;

    #[test]
    fn codec_roundtrip_request() {
        let mut codec = JsonCodec::<RequestMessage>::new();
        let mut buf = BytesMut::new();

        let req = RequestMessage {
            id: 10,
            method: "createRoom".to_string(),
            target: Target::default(),
            data: Some(json!({"roomId": 5})),
        };
        codec.encode(req, &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.id, 10);
        assert_eq!(decoded.method, "createRoom");
        assert_eq!(decoded.data, Some(json!({"roomId": 5})));
    }

    #[test]
    fn codec_roundtrip_response() {
        let mut codec = JsonCodec::<Response>::new();
        let mut buf = BytesMut::new();

        codec
            .encode(Response::rejected(3, 409, "room already exists"), &mut buf)
            .unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded, Response::rejected(3, 409, "room already exists"));
    }

    #[test]
    fn frame_is_length_prefixed() {
        let mut codec = JsonCodec::<serde_json::Value>::new();
        let mut buf = BytesMut::new();

        codec.encode(json!({"id": 1}), &mut buf).unwrap();

        assert_eq!(&buf[..4], &[0, 0, 0, 8]);
        assert_eq!(&buf[4..], br#"{"id":1}"#);
    }

    #[test]
    fn partial_frame_waits_for_more_bytes() {
        let mut codec = JsonCodec::<serde_json::Value>::new();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 8, b'{'][..]);

        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(br#""id":1}"#);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(json!({"id": 1})));
    }

    #[test]
    fn invalid_json_is_invalid_data() {
        let mut codec = JsonCodec::<serde_json::Value>::new();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 3, b'{', b'{', b'{'][..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_frame_is_not_encoded() {
        let mut codec = JsonCodec::<serde_json::Value>::new();
        let mut buf = BytesMut::new();

        let err = codec
            .encode(json!("x".repeat(MAX_FRAME_LENGTH)), &mut buf)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(err.to_string().starts_with("frame too large"));
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut codec = JsonCodec::<serde_json::Value>::new();
        let len = (MAX_FRAME_LENGTH as u32 + 1).to_be_bytes();
        let mut buf = BytesMut::from(&len[..]);

        assert!(codec.decode(&mut buf).is_err());
    }
}
