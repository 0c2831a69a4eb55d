use crate::config::ServerConfig;
use crate::error::{DropError, Result};
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// LAN IPv4 address of this machine
///
/// Candidates come from the interface list. The address the OS would route
/// outwards from breaks ties; connecting a UDP socket sends nothing.
pub fn get_local_ip() -> Result<Ipv4Addr> {
    let candidates = interface_ipv4s().unwrap_or_else(|e| {
        tracing::debug!("Failed to list interfaces: {}", e);
        Vec::new()
    });
    let preferred = routed_ipv4().ok();

    if candidates.is_empty() {
        return preferred
            .filter(|addr| is_usable(*addr))
            .ok_or_else(|| DropError::network("No non-loopback IPv4 address"));
    }

    select_lan_ipv4(&candidates, preferred)
        .ok_or_else(|| DropError::network("No non-loopback IPv4 address"))
}

/// Pick the address to advertise from the interface addresses
///
/// The routed address wins when it belongs to an interface; otherwise the
/// first address that is not link-local, then any non-loopback one.
pub fn select_lan_ipv4(candidates: &[Ipv4Addr], preferred: Option<Ipv4Addr>) -> Option<Ipv4Addr> {
    let usable: Vec<Ipv4Addr> = candidates.iter().copied().filter(|a| is_usable(*a)).collect();

    if let Some(addr) = preferred.filter(|addr| usable.contains(addr)) {
        return Some(addr);
    }
    usable
        .iter()
        .find(|addr| !addr.is_link_local())
        .or_else(|| usable.first())
        .copied()
}

fn is_usable(addr: Ipv4Addr) -> bool {
    !addr.is_loopback() && !addr.is_unspecified()
}

fn routed_ipv4() -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:80")?;
    match socket.local_addr()?.ip() {
        IpAddr::V4(addr) => Ok(addr),
        IpAddr::V6(_) => Err(DropError::network("Local IP is not IPv4")),
    }
}

/// IPv4 addresses of every interface that is up
#[cfg(unix)]
fn interface_ipv4s() -> std::io::Result<Vec<Ipv4Addr>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let mut addrs = Vec::new();
    let mut cursor = head;
    while !cursor.is_null() {
        // SAFETY: every node stays valid until freeifaddrs below
        let entry = unsafe { &*cursor };
        let up = entry.ifa_flags & libc::IFF_UP as libc::c_uint != 0;
        if up && !entry.ifa_addr.is_null() {
            let family = unsafe { (*entry.ifa_addr).sa_family };
            if i32::from(family) == libc::AF_INET {
                // SAFETY: AF_INET entries carry a sockaddr_in
                let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
                addrs.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
            }
        }
        cursor = entry.ifa_next;
    }

    unsafe { libc::freeifaddrs(head) };
    Ok(addrs)
}

#[cfg(not(unix))]
fn interface_ipv4s() -> std::io::Result<Vec<Ipv4Addr>> {
    Ok(Vec::new())
}

/// Host to show in URLs: wildcard binds resolve to the LAN address
pub fn display_host(config: &ServerConfig) -> String {
    if config.is_wildcard_host() {
        get_local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "localhost".to_string())
    } else {
        config.host.clone()
    }
}
