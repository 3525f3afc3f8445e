use rand::Rng;
use std::net::{IpAddr, Ipv4Addr};
use systemstat::{Platform, System};
use tracing_subscriber::EnvFilter;

pub fn init_log() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick an IPv4 address that remote peers can reach this host on.
///
/// Iterates over all network interfaces provided by `systemstat`, skipping
/// any loopback, link-local or broadcast addresses. Falls back to loopback
/// when no routable interface exists; the relay binds 0.0.0.0 either way,
/// this address is only used for the startup URL log.
pub fn select_host_address() -> IpAddr {
    let system = System::new();

    if let Ok(networks) = system.networks() {
        for net in networks.values() {
            for n in &net.addrs {
                if let systemstat::IpAddr::V4(v) = n.addr {
                    if !v.is_loopback() && !v.is_link_local() && !v.is_broadcast() {
                        return IpAddr::V4(v);
                    }
                }
            }
        }
    }

    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// Produce a short textual identifier for a client that has not yet
/// obtained one.
///
/// Uniform over [0, 99], base-10, no padding. Not unique across calls; the
/// tiny id space is deliberate and matches what the browser clients expect
/// to type.
pub fn generate_client_id() -> String {
    rand::thread_rng().gen_range(0..=99).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_stay_in_range() {
        for _ in 0..1000 {
            let id = generate_client_id();
            let value: u8 = id.parse().expect("a decimal integer");
            assert!(value <= 99);
        }
    }

    #[test]
    fn generated_ids_have_no_padding() {
        for _ in 0..1000 {
            let id = generate_client_id();
            let value: u8 = id.parse().unwrap();
            assert_eq!(id, value.to_string());
        }
    }
}
