use crate::error::{LedgerError, Result};
use crate::network::PeerNetwork;
use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::thread::{self, JoinHandle};

/// Accept loop that hands each inbound connection to its own handler thread
pub struct Server {
    network: PeerNetwork,
}

impl Server {
    pub fn new(network: PeerNetwork) -> Server {
        Server { network }
    }

    pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .map_err(|e| LedgerError::Connection(format!("Failed to listen on {addr}: {e}")))
    }

    /// Bind `addr` and serve forever
    pub fn run(&self, addr: SocketAddr) -> Result<()> {
        let listener = Self::bind(addr)?;
        self.serve(listener)
    }

    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Server listening on {local_addr}");

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };

                    let network = self.network.clone();
                    thread::spawn(move || {
                        if let Err(e) = network.serve_connection(stream) {
                            error!("Failed to decode message from peer {peer_addr}: {e}");
                        }
                    });
                }
                Err(e) => error!("Failed to accept connection: {e}"),
            }
        }
        Ok(())
    }

    /// Serve `listener` on a background thread
    pub fn spawn(self, listener: TcpListener) -> JoinHandle<Result<()>> {
        thread::spawn(move || self.serve(listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_in_use_port_fails() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        match Server::bind(addr) {
            Err(LedgerError::Connection(msg)) => assert!(msg.contains("Failed to listen")),
            other => panic!("expected Connection error, got {other:?}"),
        }
    }
}
