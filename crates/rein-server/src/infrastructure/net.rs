//! LAN address discovery.
//!
//! Devices are told which address to reconnect to in `connected` and
//! `server-ip`.  That is the machine's primary LAN IPv4 address, or loopback
//! when there is none (offline, or inside a container without networking).

use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;

/// The address reported to devices.
pub fn server_ip() -> IpAddr {
    match local_ip_address::local_ip() {
        Ok(ip) => ip,
        Err(e) => {
            warn!("could not determine LAN address, reporting loopback: {e}");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}
