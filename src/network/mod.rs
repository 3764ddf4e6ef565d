//! Peer-to-peer networking
//!
//! Length-prefixed JSON messages over plain TCP. Outbound connections carry
//! request/response exchanges (hello, discovery); each accepted connection
//! is served by its own thread.

pub mod message;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod server;

pub use message::{
    decode_frame, encode_message, read_frame, write_message, DiscoverPeersRequest,
    DiscoverPeersResponse, Frame, HelloRequest, HelloResponse, Message, MessageType,
    MAX_FRAME_LEN,
};
pub use peer::{NodeId, Peer, PeerConnection};
pub use protocol::{MessageSink, PeerNetwork};
pub use registry::{PeerDirectory, PeerParams, PeerRegistry};
pub use server::Server;
