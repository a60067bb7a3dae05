//! The UDP listener. A datagram carries one or more newline-separated
//! messages and is capped at 1024 bytes; anything beyond the cap is lost.

use constants;
use router::Router;
use std::io;
use std::net::UdpSocket;
use std::str;
use std::sync::Arc;

pub struct Udp {
    socket: UdpSocket,
    router: Arc<Router>,
}

impl Udp {
    pub fn bind(host: &str, port: u16, router: Arc<Router>) -> io::Result<Udp> {
        let socket = UdpSocket::bind((host, port))?;
        info!("udp server started on {}:{}", host, port);
        Ok(Udp {
            socket: socket,
            router: router,
        })
    }

    /// Receive loop; datagrams are routed line by line.
    pub fn run(self) {
        let mut buffer = [0; constants::MAX_DATAGRAM_LENGTH];
        loop {
            let received = match self.socket.recv_from(&mut buffer) {
                Ok((received, _)) => received,
                Err(e) => {
                    error!("an error occurred while receiving data: {}", e);
                    continue;
                }
            };

            match str::from_utf8(&buffer[..received]) {
                Ok(payload) => {
                    trace!("udp - {}", payload);
                    for line in payload.split('\n') {
                        if !line.trim().is_empty() {
                            self.router.route_line(line);
                        }
                    }
                }
                Err(_) => warn!("datagram is not valid utf-8, dropping"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buffer::GlobalBuffer;
    use client::mock::Recorder;
    use stats::Registry;
    use std::net::UdpSocket;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn datagram_with_several_lines() {
        let stats = Arc::new(Registry::new());
        let client = Arc::new(Recorder::new(true));
        let global = Arc::new(GlobalBuffer::new(100, true, client));
        let router = Arc::new(Router::new(global.clone(), None, stats));

        let listener = Udp::bind("127.0.0.1", 0, router).unwrap();
        let addr = listener.socket.local_addr().unwrap();
        thread::spawn(move || listener.run());

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(b"udp.one 1 100\nudp.two 2 200\nbroken\n", addr)
            .unwrap();

        let mut messages = Vec::new();
        for _ in 0..50 {
            thread::sleep(Duration::from_millis(100));
            global.take_all(&mut messages);
            if messages.len() == 2 {
                break;
            }
        }
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.name == "udp.one"));
        assert!(messages.iter().any(|m| m.name == "udp.two"));
    }
}
