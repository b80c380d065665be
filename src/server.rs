//! TCP Listener
//!
//! Accepts connections forever and gives each one its own task, command
//! handler and decoder state. There is no connection limit.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error};

/// Main loop that accepts incoming connections.
///
/// A failed `accept` is logged and the loop keeps going; it only affects
/// the connection that could not be accepted.
pub async fn accept_loop(
    listener: TcpListener,
    storage: Arc<Store>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(client = %addr, error = %e, "Failed to set TCP_NODELAY");
                }

                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(stream, addr, handler, stats));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_accepts_many_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stats = Arc::new(ConnectionStats::new());
        tokio::spawn(accept_loop(
            listener,
            Arc::new(Store::new()),
            Arc::clone(&stats),
        ));

        let mut clients = Vec::new();
        for i in 0..10 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            let key = format!("k{}", i);
            let request = format!("*3\r\n$3\r\nSET\r\n${}\r\n{}\r\n$1\r\nv\r\n", key.len(), key);
            client.write_all(request.as_bytes()).await.unwrap();

            let mut reply = [0u8; 5];
            client.read_exact(&mut reply).await.unwrap();
            assert_eq!(&reply, b"+OK\r\n");
            clients.push(client);
        }

        // Every client sees keys written by the others
        let mut reply = [0u8; 7];
        clients[0]
            .write_all(b"*2\r\n$3\r\nGET\r\n$2\r\nk9\r\n")
            .await
            .unwrap();
        clients[0].read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"$1\r\nv\r\n");

        assert_eq!(
            stats
                .connections_accepted
                .load(std::sync::atomic::Ordering::Relaxed),
            10
        );
    }
}
