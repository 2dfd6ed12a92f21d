//! The TCP fan-out bridge: one backend connection per logical node,
//! relaying packets between a node's CAN session and its dedicated socket.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{error, info, warn};

use crate::packet::SendPacket;
use crate::server::CanServer;

/// The upper bound on a single outbound ISO-TP chunk originating from TCP,
/// kept below the 4095-byte protocol ceiling to leave margin.
pub const MAX_SEND_SIZE: usize = 2048;

/// Configuration for the backend MQTT broker this bridge dials into.
#[derive(Clone, Debug)]
pub struct BackendAddr {
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    fn to_socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A hook point for observing packets as they cross the bridge in either
/// direction, without being able to alter delivery. Used to wire in the
/// optional MQTT diagnostic printer.
pub trait PacketObserver: Send + Sync {
    fn on_uplink(&self, _src_addr: u8, _data: &[u8]) {}
    fn on_downlink(&self, _dst_addr: u8, _data: &[u8]) {}
}

/// An observer that does nothing, the default when diagnostics are disabled.
pub struct NoopObserver;
impl PacketObserver for NoopObserver {}

struct ConnectionTable {
    connections: Mutex<std::collections::HashMap<u8, Arc<TcpStream>>>,
}

impl ConnectionTable {
    fn new() -> Self {
        Self {
            connections: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

/// Maintains one TCP connection per logical node address and shuttles
/// packets between each node's CAN session and its backend socket.
pub struct TcpBridge {
    can_server: Arc<CanServer>,
    backend: BackendAddr,
    table: Arc<ConnectionTable>,
    observer: Arc<dyn PacketObserver>,
}

impl TcpBridge {
    pub fn new(can_server: Arc<CanServer>, backend: BackendAddr) -> Self {
        Self {
            can_server,
            backend,
            table: Arc::new(ConnectionTable::new()),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PacketObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs the CAN-side receive loop on the calling thread. Never returns
    /// under normal operation; each node gets its own reverse-direction
    /// worker thread as its first packet arrives.
    pub fn run(&self) -> ! {
        loop {
            let packet = self.can_server.recv_packet();
            self.observer.on_uplink(packet.src_addr, packet.data());

            let sock = match self.socket_for(packet.src_addr) {
                Some(sock) => sock,
                None => continue,
            };

            if let Err(err) = (&*sock).write_all(packet.data()) {
                error!(addr = packet.src_addr, %err, "error sending to TCP backend; closing connection");
                self.remove_if_current(packet.src_addr, &sock);
            }
        }
    }

    /// Returns the socket for `addr`, dialing the backend and spawning the
    /// reverse-direction worker on first contact.
    fn socket_for(&self, addr: u8) -> Option<Arc<TcpStream>> {
        let mut connections = self.table.connections.lock().unwrap();
        if let Some(sock) = connections.get(&addr) {
            return Some(sock.clone());
        }

        info!(addr, host = %self.backend.host, port = self.backend.port, "opening backend connection");
        let sock = match TcpStream::connect(self.backend.to_socket_addr()) {
            Ok(sock) => Arc::new(sock),
            Err(err) => {
                error!(addr, %err, "failed to connect to backend");
                return None;
            }
        };
        connections.insert(addr, sock.clone());
        drop(connections);

        let can_server = self.can_server.clone();
        let table = self.table.clone();
        let observer = self.observer.clone();
        let worker_sock = sock.clone();
        thread::spawn(move || reverse_worker(addr, worker_sock, can_server, table, observer));

        Some(sock)
    }

    fn remove_if_current(&self, addr: u8, sock: &Arc<TcpStream>) {
        remove_if_current(&self.table, addr, sock);
    }
}

fn remove_if_current(table: &ConnectionTable, addr: u8, sock: &Arc<TcpStream>) {
    let mut connections = table.connections.lock().unwrap();
    if let Some(current) = connections.get(&addr) {
        if Arc::ptr_eq(current, sock) {
            connections.remove(&addr);
        }
    }
}

/// Reads from one node's backend socket and forwards the bytes into the CAN
/// side, split into chunks no larger than [`MAX_SEND_SIZE`].
fn reverse_worker(
    addr: u8,
    sock: Arc<TcpStream>,
    can_server: Arc<CanServer>,
    table: Arc<ConnectionTable>,
    observer: Arc<dyn PacketObserver>,
) {
    let mut buf = vec![0u8; MAX_SEND_SIZE];
    loop {
        let n = match (&*sock).read(&mut buf) {
            Ok(0) => {
                info!(addr, "backend connection closed (EOF)");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                error!(addr, %err, "error reading from backend; closing connection");
                break;
            }
        };

        for chunk in buf[..n].chunks(MAX_SEND_SIZE) {
            observer.on_downlink(addr, chunk);
            let packet = match SendPacket::new(addr, chunk.to_vec()) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!(addr, %err, "dropping oversized backend chunk");
                    continue;
                }
            };
            if let Err(err) = can_server.send_packet(packet) {
                warn!(addr, %err, "failed to deliver packet to node");
            }
        }
    }

    remove_if_current(&table, addr, &sock);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    use crate::transport::LoopbackBus;

    fn start_echo_server() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 256];
                while let Ok(n) = stream.read(&mut buf) {
                    if n == 0 {
                        break;
                    }
                    let _ = stream.write_all(&buf[..n]);
                }
            }
        });
        port
    }

    fn test_bridge(port: u16) -> TcpBridge {
        let bus = Arc::new(LoopbackBus::new());
        let can_server = Arc::new(CanServer::new(bus));
        TcpBridge::new(
            can_server,
            BackendAddr {
                host: "127.0.0.1".to_owned(),
                port,
            },
        )
    }

    #[test]
    fn socket_for_reuses_the_connection_on_repeat_lookups() {
        let port = start_echo_server();
        let bridge = test_bridge(port);

        let first = bridge.socket_for(1).expect("first dial succeeds");
        let second = bridge.socket_for(1).expect("second lookup reuses entry");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bridge.table.connections.lock().unwrap().len(), 1);
    }

    #[test]
    fn socket_for_opens_distinct_connections_per_address() {
        let port = start_echo_server();
        let bridge = test_bridge(port);

        let a = bridge.socket_for(1).unwrap();
        let b = bridge.socket_for(2).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(bridge.table.connections.lock().unwrap().len(), 2);
    }

    #[test]
    fn remove_if_current_is_a_no_op_for_a_stale_socket() {
        let port = start_echo_server();
        let bridge = test_bridge(port);

        let current = bridge.socket_for(1).unwrap();
        let stale = Arc::new(TcpStream::connect(("127.0.0.1", port)).unwrap());
        bridge.remove_if_current(1, &stale);
        assert_eq!(bridge.table.connections.lock().unwrap().len(), 1);

        bridge.remove_if_current(1, &current);
        assert_eq!(bridge.table.connections.lock().unwrap().len(), 0);
    }
}
