//! The TCP listener: one short-lived connection per message.
//!
//! A client connects, writes one `<name> <value> <timestamp>` payload
//! terminated by a NUL byte (or simply closes the stream) and is done.

use router::Router;
use stats;
use stats::Registry;
use std::io;
use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::str;
use std::sync::Arc;
use std::thread;

pub struct Tcp {
    listener: TcpListener,
    router: Arc<Router>,
    stats: Arc<Registry>,
}

impl Tcp {
    /// Bind the listen socket up front so a bad endpoint is caught at
    /// startup rather than in the accept thread.
    pub fn bind(
        host: &str,
        port: u16,
        router: Arc<Router>,
        stats: Arc<Registry>,
    ) -> io::Result<Tcp> {
        let addrs: Vec<_> = (host, port).to_socket_addrs()?.collect();
        let listener = TcpListener::bind(&addrs[..])?;
        info!("tcp server started on {}:{}", host, port);
        Ok(Tcp {
            listener: listener,
            router: router,
            stats: stats,
        })
    }

    /// Accept loop; every peer gets its own handler thread.
    pub fn run(self) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    debug!("new peer at {:?}", stream.peer_addr());
                    self.stats.raise(stats::REQUESTS_INCOMING, 1);
                    let router = self.router.clone();
                    let stats = self.stats.clone();
                    thread::spawn(move || handle_client(router, stats, stream));
                }
                Err(e) => error!("server handler accept error: {}", e),
            }
        }
    }
}

fn handle_client(router: Arc<Router>, stats: Arc<Registry>, stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    let mut payload = Vec::new();

    match reader.read_until(b'\0', &mut payload) {
        Ok(_) => {
            if payload.last() == Some(&b'\0') {
                payload.pop();
            }
            match str::from_utf8(&payload) {
                Ok(line) => {
                    trace!("tcp - {}", line);
                    stats.raise(stats::REQUESTS_ACCEPTED, 1);
                    router.route_line(line);
                }
                Err(_) => warn!("request payload is not valid utf-8, dropping"),
            }
        }
        Err(e) => error!("handler read error: {}", e),
    }
}
