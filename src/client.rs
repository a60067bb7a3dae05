//! The downstream client: ships batches of messages to a Graphite server.

use message::Message;
use stats;
use stats::Registry;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;

/// Anything able to deliver a batch of messages downstream.
///
/// `send` returns true only when the whole batch was handed to the remote
/// end; on false the caller still owns the messages and decides what to do
/// with them.
pub trait Client: Send + Sync {
    /// Deliver `batch` downstream.
    fn send(&self, batch: &[Arc<Message>]) -> bool;
}

/// Plain-text TCP client for a Graphite ingestion endpoint.
///
/// A fresh connection is established for every batch; the batch is written
/// as newline-terminated serialized messages in a single write.
pub struct Graphite {
    host: String,
    port: u16,
    stats: Arc<Registry>,
}

fn connect(host: &str, port: u16) -> Option<TcpStream> {
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            for addr in addrs {
                match TcpStream::connect(addr) {
                    Ok(stream) => return Some(stream),
                    Err(e) => info!(
                        "unable to connect to {} using addr {} with error {}",
                        host, addr, e
                    ),
                }
            }
            None
        }
        Err(e) => {
            info!("unable to perform DNS lookup on host {} with error {}", host, e);
            None
        }
    }
}

impl Graphite {
    /// Create a new client. The host must be non-empty; resolution and
    /// connection happen lazily at send time.
    pub fn new(host: &str, port: u16, stats: Arc<Registry>) -> Result<Graphite, String> {
        if host.is_empty() {
            return Err("client host can not be empty".to_string());
        }
        info!("creating client to {}:{}", host, port);
        Ok(Graphite {
            host: host.to_string(),
            port: port,
            stats: stats,
        })
    }
}

impl Client for Graphite {
    fn send(&self, batch: &[Arc<Message>]) -> bool {
        if batch.is_empty() {
            debug!("nothing to send");
            return false;
        }

        let mut stream = match connect(&self.host, self.port) {
            Some(stream) => stream,
            None => {
                self.stats.raise(stats::CLIENT_CONNECTION_FAILED, 1);
                error!("connection to {}:{} failed", self.host, self.port);
                return false;
            }
        };

        let mut payload = String::with_capacity(batch.len() * 32);
        for message in batch {
            payload.push_str(&message.serialize());
            payload.push('\n');
        }

        match stream.write_all(payload.as_bytes()) {
            Ok(()) => {
                info!("sending {} messages", batch.len());
                debug!("send content:\n{}", payload);
                self.stats.raise(stats::REQUESTS_SEND, 1);
                self.stats.raise(stats::REQUESTS_SEND_CONTENT, batch.len() as i64);
                true
            }
            Err(e) => {
                error!(
                    "failed to write {} messages to {}:{}: {}",
                    batch.len(),
                    self.host,
                    self.port,
                    e
                );
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use stats::Registry;
    use std::sync::Arc;

    #[test]
    fn empty_host_is_refused() {
        assert!(Graphite::new("", 2003, Arc::new(Registry::new())).is_err());
    }

    #[test]
    fn unreachable_endpoint_reports_failure() {
        let stats = Arc::new(Registry::new());
        let client = Graphite::new("127.0.0.1", 1, stats.clone()).unwrap();
        let batch = vec![Arc::new(::message::Message::new("test.1", 1.0, 1))];
        assert!(!client.send(&batch));
    }

    #[test]
    fn empty_batch_reports_failure() {
        let stats = Arc::new(Registry::new());
        let client = Graphite::new("localhost", 2003, stats).unwrap();
        assert!(!client.send(&[]));
    }
}
