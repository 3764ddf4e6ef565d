//! Wire messages and their framing.
//!
//! Each frame is a 4-byte big-endian length followed by a JSON envelope
//! `{"type": "<tag>", "payload": {...}}`. The tag is read first so that an
//! unknown tag can be reported and skipped instead of killing the connection.

use crate::core::{Block, PublicKey, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read, Write};

/// Largest frame body accepted or produced (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Block,
    Transaction,
    DiscoverPeersRequest,
    DiscoverPeersResponse,
    HelloRequest,
    HelloResponse,
}

impl MessageType {
    pub const ALL: [MessageType; 6] = [
        MessageType::Block,
        MessageType::Transaction,
        MessageType::DiscoverPeersRequest,
        MessageType::DiscoverPeersResponse,
        MessageType::HelloRequest,
        MessageType::HelloResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Block => "Block",
            MessageType::Transaction => "Transaction",
            MessageType::DiscoverPeersRequest => "DiscoverPeersRequest",
            MessageType::DiscoverPeersResponse => "DiscoverPeersResponse",
            MessageType::HelloRequest => "HelloRequest",
            MessageType::HelloResponse => "HelloResponse",
        }
    }

    pub fn from_tag(tag: &str) -> Option<MessageType> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    pub node_id: NodeId,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub node_id: NodeId,
    pub public_key: PublicKey,
}

/// The sender's current peer set, not filtered against the recipient's
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoverPeersRequest {
    pub known_peers: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoverPeersResponse {
    pub peers: Vec<NodeId>,
}

/// One decoded wire message; the variant is the envelope's type tag
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Block(Block),
    Transaction(Transaction),
    DiscoverPeersRequest(DiscoverPeersRequest),
    DiscoverPeersResponse(DiscoverPeersResponse),
    HelloRequest(HelloRequest),
    HelloResponse(HelloResponse),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Block(_) => MessageType::Block,
            Message::Transaction(_) => MessageType::Transaction,
            Message::DiscoverPeersRequest(_) => MessageType::DiscoverPeersRequest,
            Message::DiscoverPeersResponse(_) => MessageType::DiscoverPeersResponse,
            Message::HelloRequest(_) => MessageType::HelloRequest,
            Message::HelloResponse(_) => MessageType::HelloResponse,
        }
    }

    fn payload(&self) -> Result<serde_json::Value> {
        let value = match self {
            Message::Block(block) => serde_json::to_value(block)?,
            Message::Transaction(tx) => serde_json::to_value(tx)?,
            Message::DiscoverPeersRequest(req) => serde_json::to_value(req)?,
            Message::DiscoverPeersResponse(res) => serde_json::to_value(res)?,
            Message::HelloRequest(req) => serde_json::to_value(req)?,
            Message::HelloResponse(res) => serde_json::to_value(res)?,
        };
        Ok(value)
    }
}

/// Result of decoding one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Message),
    /// A well-formed envelope whose tag this node does not know
    Unknown(String),
}

impl Frame {
    /// Tag name for diagnostics
    pub fn tag(&self) -> String {
        match self {
            Frame::Message(message) => message.message_type().to_string(),
            Frame::Unknown(tag) => tag.clone(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Encode a message into a JSON envelope body (no length prefix)
pub fn encode_message(message: &Message) -> Result<Vec<u8>> {
    let envelope = Envelope {
        kind: message.message_type().as_str().to_string(),
        payload: message.payload()?,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Decode a JSON envelope body (no length prefix)
pub fn decode_frame(body: &[u8]) -> Result<Frame> {
    let envelope: Envelope = serde_json::from_slice(body)?;

    let Some(kind) = MessageType::from_tag(&envelope.kind) else {
        return Ok(Frame::Unknown(envelope.kind));
    };

    let payload = envelope.payload;
    let message = match kind {
        MessageType::Block => Message::Block(serde_json::from_value(payload)?),
        MessageType::Transaction => Message::Transaction(serde_json::from_value(payload)?),
        MessageType::DiscoverPeersRequest => {
            Message::DiscoverPeersRequest(serde_json::from_value(payload)?)
        }
        MessageType::DiscoverPeersResponse => {
            Message::DiscoverPeersResponse(serde_json::from_value(payload)?)
        }
        MessageType::HelloRequest => Message::HelloRequest(serde_json::from_value(payload)?),
        MessageType::HelloResponse => Message::HelloResponse(serde_json::from_value(payload)?),
    };
    Ok(Frame::Message(message))
}

/// Write one length-prefixed frame and flush
pub fn write_message<W: Write>(writer: &mut W, message: &Message) -> Result<()> {
    let body = encode_message(message)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(LedgerError::Serialization(format!(
            "{} message of {} bytes exceeds frame limit",
            message.message_type(),
            body.len()
        )));
    }

    let len = body.len() as u32;
    writer
        .write_all(&len.to_be_bytes())
        .and_then(|_| writer.write_all(&body))
        .and_then(|_| writer.flush())
        .map_err(|e| LedgerError::Connection(format!("Failed to send message: {e}")))
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
/// Ending inside the length prefix is an error.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    let mut filled = 0;
    while filled < LENGTH_PREFIX_LEN {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(LedgerError::Connection(format!(
                    "connection closed after {filled} of {LENGTH_PREFIX_LEN} length bytes"
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                return Err(LedgerError::Connection(format!(
                    "Failed to read message: {e}"
                )))
            }
        }
    }

    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_FRAME_LEN {
        return Err(LedgerError::Serialization(format!(
            "incoming frame of {len} bytes exceeds frame limit"
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| LedgerError::Connection(format!("Failed to read message body: {e}")))?;

    decode_frame(&body).map(Some)
}
