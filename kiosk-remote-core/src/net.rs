use std::collections::BTreeMap;

use nix::{ifaddrs::getifaddrs, net::if_::InterfaceFlags};

use crate::error::{RemoteError, RemoteResult};

/// Non-loopback IPv4 addresses per interface.
pub fn ip_addresses() -> RemoteResult<BTreeMap<String, Vec<String>>> {
    let addrs = getifaddrs()
        .map_err(|e| RemoteError::execution(format!("Could not read IPs: {}", e)))?;

    let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for ifaddr in addrs {
        if ifaddr.flags.contains(InterfaceFlags::IFF_LOOPBACK) {
            continue;
        }
        let Some(addr) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        result
            .entry(ifaddr.interface_name)
            .or_default()
            .push(addr.ip().to_string());
    }
    Ok(result)
}

/// All addresses of [`ip_addresses`] in one list.
pub fn flat_ip_addresses() -> Vec<String> {
    ip_addresses()
        .map(|by_interface| by_interface.into_values().flatten().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_is_excluded() {
        let addresses = ip_addresses().unwrap();
        assert!(
            addresses
                .values()
                .flatten()
                .all(|ip| !ip.starts_with("127."))
        );
        assert_eq!(
            flat_ip_addresses().len(),
            addresses.values().map(Vec::len).sum::<usize>()
        );
    }
}
