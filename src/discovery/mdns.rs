use crate::device::get_local_ip;
use crate::discovery::dns::{build_response, parse_questions, query_id};
use crate::discovery::traits::{AliasPublisher, alias_host};
use crate::error::{DropError, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const MDNS_ADDRESS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;
/// TTL for the published A record, as recommended for host names
const RECORD_TTL: u32 = 120;
const ANNOUNCE_DELAYS: [Duration; 2] = [Duration::ZERO, Duration::from_secs(1)];

/// Host record being answered for
#[derive(Clone, Debug)]
struct Record {
    host: String,
    ip: Ipv4Addr,
}

impl Record {
    /// Reply to a query packet, if it asks about this host
    fn answer(&self, packet: &[u8], from_mdns_port: bool) -> Option<Vec<u8>> {
        let questions = parse_questions(packet)?;
        if !questions.iter().any(|q| q.asks_for(&self.host)) {
            return None;
        }
        // multicast responses carry id 0; legacy unicast resolvers expect theirs back
        let id = if from_mdns_port { 0 } else { query_id(packet)? };
        Some(build_response(id, &self.host, self.ip, RECORD_TTL))
    }
}

/// Minimal multicast DNS responder publishing `<alias>.local`
#[derive(Default)]
pub struct MdnsPublisher {
    record: Option<Record>,
    socket: Option<Arc<UdpSocket>>,
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl MdnsPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AliasPublisher for MdnsPublisher {
    async fn publish_alias(&mut self, alias: &str, port: u16) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let record = Record {
            host: alias_host(alias),
            ip: get_local_ip()?,
        };

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT));
        let socket = create_reusable_udp_socket(&bind_addr)?;
        socket.join_multicast_v4(MDNS_ADDRESS, Ipv4Addr::UNSPECIFIED)?;
        socket.set_multicast_ttl_v4(255)?;

        let socket = Arc::new(socket);
        self.running.store(true, Ordering::Relaxed);

        let running = self.running.clone();
        let task_socket = socket.clone();
        let task_record = record.clone();
        let task = tokio::spawn(async move {
            respond(task_socket, task_record, running).await;
        });

        tracing::info!(
            "Published {} -> {} (port {})",
            record.host,
            record.ip,
            port
        );

        self.socket = Some(socket);
        self.record = Some(record);
        self.task = Some(task);
        Ok(())
    }

    async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }

        if let (Some(socket), Some(record)) = (&self.socket, &self.record) {
            let goodbye = build_response(0, &record.host, record.ip, 0);
            let group = SocketAddrV4::new(MDNS_ADDRESS, MDNS_PORT);
            if let Err(e) = socket.send_to(&goodbye, group).await {
                tracing::debug!("Failed to send mDNS goodbye: {}", e);
            }
            tracing::info!("Unpublished {}", record.host);
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.socket = None;
        self.record = None;
    }
}

impl Drop for MdnsPublisher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn respond(socket: Arc<UdpSocket>, record: Record, running: Arc<AtomicBool>) {
    let group = SocketAddrV4::new(MDNS_ADDRESS, MDNS_PORT);
    let announcement = build_response(0, &record.host, record.ip, RECORD_TTL);

    for delay in ANNOUNCE_DELAYS {
        tokio::time::sleep(delay).await;
        if let Err(e) = socket.send_to(&announcement, group).await {
            tracing::warn!("Failed to announce {}: {}", record.host, e);
        }
    }

    let mut buf = vec![0u8; 9000];
    while running.load(Ordering::Relaxed) {
        match tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf)).await {
            Ok(Ok((len, src))) => {
                let from_mdns_port = src.port() == MDNS_PORT;
                let Some(reply) = record.answer(&buf[..len], from_mdns_port) else {
                    continue;
                };
                let target = if from_mdns_port {
                    SocketAddr::V4(group)
                } else {
                    src
                };
                tracing::debug!("Answering {} query from {}", record.host, src);
                if let Err(e) = socket.send_to(&reply, target).await {
                    tracing::debug!("Failed to answer {}: {}", src, e);
                }
            }
            Ok(Err(e)) => tracing::debug!("mDNS receive error: {}", e),
            Err(_) => continue,
        }
    }
}

/// UDP socket bound with address and port reuse
///
/// Port 5353 is normally held by the system resolver as well; both sockets
/// receive every multicast datagram.
fn create_reusable_udp_socket(bind_addr: &SocketAddr) -> Result<UdpSocket> {
    let domain = if bind_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| DropError::network(format!("Failed to create socket: {}", e)))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| DropError::network(format!("Failed to set reuse_address: {}", e)))?;

    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket
        .set_reuse_port(true)
        .map_err(|e| DropError::network(format!("Failed to set reuse_port: {}", e)))?;

    socket
        .bind(&(*bind_addr).into())
        .map_err(|e| DropError::network(format!("Failed to bind to {}: {}", bind_addr, e)))?;

    let std_socket: std::net::UdpSocket = socket.into();
    std_socket
        .set_nonblocking(true)
        .map_err(|e| DropError::network(format!("Failed to set non-blocking: {}", e)))?;

    UdpSocket::from_std(std_socket)
        .map_err(|e| DropError::network(format!("Failed to convert to tokio socket: {}", e)))
}
