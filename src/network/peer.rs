use crate::core::{Block, PublicKey, Transaction};
use crate::error::{LedgerError, Result};
use crate::network::message::{
    read_frame, write_message, DiscoverPeersRequest, DiscoverPeersResponse, Frame, HelloRequest,
    HelloResponse, Message, MessageType,
};
use data_encoding::HEXLOWER;
use log::debug;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::BufReader;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Opaque peer identifier chosen randomly by each node at startup.
///
/// Not derived from key material: a peer's NodeID and public key are
/// bound only by what it claims in its hello.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> NodeId {
        NodeId(id.into())
    }

    /// 16 random bytes, hex encoded
    pub fn generate() -> NodeId {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let node_id = NodeId(HEXLOWER.encode(&bytes));
        debug!("nodeID: {node_id}");
        node_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to one TCP connection.
///
/// Outbound connections own both halves and can run request/response
/// exchanges. Connections accepted by the listener are write-only here,
/// because the inbound handler owns the read half.
#[derive(Debug, Clone)]
pub struct PeerConnection {
    writer: Arc<Mutex<TcpStream>>,
    reader: Option<Arc<Mutex<BufReader<TcpStream>>>>,
    remote: Option<SocketAddr>,
}

impl PeerConnection {
    /// Wrap a dialed stream, keeping a reader for responses
    pub fn outbound(stream: TcpStream) -> Result<PeerConnection> {
        let remote = stream.peer_addr().ok();
        let read_half = stream
            .try_clone()
            .map_err(|e| LedgerError::Connection(format!("Failed to clone stream: {e}")))?;
        Ok(PeerConnection {
            writer: Arc::new(Mutex::new(stream)),
            reader: Some(Arc::new(Mutex::new(BufReader::new(read_half)))),
            remote,
        })
    }

    /// Wrap an accepted stream for sending only
    pub fn inbound(stream: &TcpStream) -> Result<PeerConnection> {
        let remote = stream.peer_addr().ok();
        let write_half = stream
            .try_clone()
            .map_err(|e| LedgerError::Connection(format!("Failed to clone stream: {e}")))?;
        Ok(PeerConnection {
            writer: Arc::new(Mutex::new(write_half)),
            reader: None,
            remote,
        })
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn can_request(&self) -> bool {
        self.reader.is_some()
    }

    /// True when both handles refer to the same underlying connection
    pub fn same_as(&self, other: &PeerConnection) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }

    pub fn send(&self, message: &Message) -> Result<()> {
        let mut stream = lock(&self.writer);
        write_message(&mut *stream, message)
    }

    /// Send `message` and return the next frame read from the connection,
    /// waiting at most `timeout` for it (`None` waits forever).
    ///
    /// The reader stays locked for the whole exchange so concurrent
    /// requests on one connection cannot take each other's responses.
    /// A failed read leaves the stream mid-frame, so the connection is
    /// shut down.
    pub fn request(&self, message: &Message, timeout: Option<Duration>) -> Result<Frame> {
        let reader = self.reader.as_ref().ok_or_else(|| {
            LedgerError::Connection(
                "connection is read by its inbound handler; responses cannot be awaited"
                    .to_string(),
            )
        })?;

        let mut reader = lock(reader);
        reader
            .get_ref()
            .set_read_timeout(timeout)
            .map_err(|e| LedgerError::Connection(format!("Failed to set read timeout: {e}")))?;
        self.send(message)?;

        let frame = read_frame(&mut *reader).and_then(|frame| {
            frame.ok_or_else(|| {
                LedgerError::Connection("connection closed while awaiting response".to_string())
            })
        });
        if frame.is_err() {
            self.shutdown();
        }
        frame
    }

    pub fn shutdown(&self) {
        let _ = lock(&self.writer).shutdown(Shutdown::Both);
    }
}

fn mismatch(expected: MessageType, received: &Frame) -> LedgerError {
    LedgerError::ProtocolMismatch {
        expected: expected.to_string(),
        received: received.tag(),
    }
}

#[derive(Debug, Clone)]
pub struct Peer {
    node_id: NodeId,                     // Globally unique peer identifier, as claimed
    address: Option<IpAddr>,             // IP address, when known
    port: u16,                           // Port number, when known
    public_key: PublicKey,               // Public key, as claimed
    connection: Option<PeerConnection>,  // Live TCP connection, if any
}

impl Peer {
    pub fn new(node_id: NodeId, address: Option<IpAddr>, port: u16, public_key: PublicKey) -> Peer {
        Peer {
            node_id,
            address,
            port,
            public_key,
            connection: None,
        }
    }

    /// Dial `addr`. The returned peer has no identity until a hello exchange fills it in.
    pub fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<Peer> {
        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| LedgerError::Connection(format!("Failed to connect to {addr}: {e}")))?;

        Ok(Peer {
            node_id: NodeId::default(),
            address: Some(addr.ip()),
            port: addr.port(),
            public_key: PublicKey::default(),
            connection: Some(PeerConnection::outbound(stream)?),
        })
    }

    pub fn with_connection(mut self, connection: PeerConnection) -> Peer {
        self.connection = Some(connection);
        self
    }

    /// Adopt the identity a counterpart claimed in its hello
    pub fn set_identity(&mut self, node_id: NodeId, public_key: PublicKey) {
        self.node_id = node_id;
        self.public_key = public_key;
    }

    pub fn get_node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn get_address(&self) -> Option<IpAddr> {
        self.address
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub fn get_public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn get_connection(&self) -> Option<&PeerConnection> {
        self.connection.as_ref()
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.address.map(|ip| SocketAddr::new(ip, self.port))
    }

    fn connection(&self) -> Result<&PeerConnection> {
        self.connection.as_ref().ok_or_else(|| {
            LedgerError::Connection(format!("peer {} has no open connection", self.node_id))
        })
    }

    pub fn send_block(&self, block: &Block) -> Result<()> {
        self.connection()?.send(&Message::Block(block.clone()))
    }

    pub fn send_transaction(&self, tx: &Transaction) -> Result<()> {
        self.connection()?.send(&Message::Transaction(tx.clone()))
    }

    /// Hello exchange, initiator side. The first message received back must be a `HelloResponse`.
    pub fn send_hello_request(
        &self,
        request: &HelloRequest,
        timeout: Option<Duration>,
    ) -> Result<HelloResponse> {
        let frame = self
            .connection()?
            .request(&Message::HelloRequest(request.clone()), timeout)?;
        match frame {
            Frame::Message(Message::HelloResponse(response)) => Ok(response),
            other => Err(mismatch(MessageType::HelloResponse, &other)),
        }
    }

    pub fn send_hello_response(&self, response: &HelloResponse) -> Result<()> {
        self.connection()?
            .send(&Message::HelloResponse(response.clone()))
    }

    /// Discovery exchange, initiator side
    pub fn send_discover_peers_request(
        &self,
        request: &DiscoverPeersRequest,
        timeout: Option<Duration>,
    ) -> Result<DiscoverPeersResponse> {
        let frame = self
            .connection()?
            .request(&Message::DiscoverPeersRequest(request.clone()), timeout)?;
        match frame {
            Frame::Message(Message::DiscoverPeersResponse(response)) => Ok(response),
            other => Err(mismatch(MessageType::DiscoverPeersResponse, &other)),
        }
    }

    pub fn send_discover_peers_response(&self, response: &DiscoverPeersResponse) -> Result<()> {
        self.connection()?
            .send(&Message::DiscoverPeersResponse(response.clone()))
    }

    pub fn disconnect(&self) {
        if let Some(connection) = &self.connection {
            connection.shutdown();
        }
    }
}
