//! Wire protocol types for parent-worker communication.
//!
//! The parent sends [`RequestMessage`] documents; the worker answers each one
//! with exactly one [`Response`] carrying the same id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolViolation;

/// Methods the worker understands.
///
/// The parent is built in lockstep with the worker, so anything outside this
/// set is a version mismatch rather than bad input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodId {
    DumpWorker,
    CreateRoom,
    CloseRoom,
    DumpRoom,
    CreatePeer,
    ClosePeer,
}

impl MethodId {
    pub const ALL: [MethodId; 6] = [
        Self::DumpWorker,
        Self::CreateRoom,
        Self::CloseRoom,
        Self::DumpRoom,
        Self::CreatePeer,
        Self::ClosePeer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DumpWorker => "dumpWorker",
            Self::CreateRoom => "createRoom",
            Self::CloseRoom => "closeRoom",
            Self::DumpRoom => "dumpRoom",
            Self::CreatePeer => "createPeer",
            Self::ClosePeer => "closePeer",
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodId {
    type Err = ProtocolViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| ProtocolViolation::UnknownMethod {
                method: s.to_string(),
            })
    }
}

/// Domain object a request applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_name: Option<String>,
}

impl Target {
    pub fn room(room_id: u32) -> Self {
        Self {
            room_id: Some(room_id),
            peer_name: None,
        }
    }

    pub fn peer(room_id: u32, peer_name: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id),
            peer_name: Some(peer_name.into()),
        }
    }
}

/// Request document as it appears on the wire.
///
/// `method` stays a string here so an unknown method can be reported as a
/// protocol violation instead of an opaque decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMessage {
    pub id: u32,
    pub method: String,
    #[serde(default)]
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Response document sent back to the parent.
///
/// Accepted responses carry optional `data`; rejected ones carry `code` and
/// `reason`. Use the constructors, which keep the two shapes apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u32,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Response {
    pub fn accepted(id: u32, data: Option<serde_json::Value>) -> Self {
        Self {
            id,
            accepted: true,
            data,
            code: None,
            reason: None,
        }
    }

    pub fn rejected(id: u32, code: u16, reason: impl Into<String>) -> Self {
        Self {
            id,
            accepted: false,
            data: None,
            code: Some(code),
            reason: Some(reason.into()),
        }
    }
}
