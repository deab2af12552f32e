//! IP network whitelists.
//!
//! Containment is subnet containment: a network is in the whitelist only if
//! it lies entirely inside one whitelisted network. IPv4 and IPv6 entries
//! are kept apart and never compared with each other.

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};

use super::AccessControlError;

/// A parsed list of IPv4 and IPv6 networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkWhitelist {
    ipv4: Vec<Ipv4Net>,
    ipv6: Vec<Ipv6Net>,
}

/// Parses a CIDR network or a single address (as a /32 or /128).
///
/// Networks with host bits set (`10.0.0.1/8`) are rejected.
pub fn parse_network(raw: &str) -> Result<IpNet, AccessControlError> {
    let raw = raw.trim();
    let network = if raw.contains('/') {
        IpNet::from_str(raw).map_err(|e| AccessControlError::InvalidNetwork {
            network: raw.to_string(),
            reason: e.to_string(),
        })?
    } else {
        let addr = IpAddr::from_str(raw).map_err(|e| AccessControlError::InvalidNetwork {
            network: raw.to_string(),
            reason: e.to_string(),
        })?;
        IpNet::from(addr)
    };

    if network.trunc() != network {
        return Err(AccessControlError::InvalidNetwork {
            network: raw.to_string(),
            reason: "host bits set".to_string(),
        });
    }
    Ok(network)
}

fn private_ranges() -> &'static [IpNet] {
    static RANGES: OnceLock<Vec<IpNet>> = OnceLock::new();
    RANGES.get_or_init(|| {
        [
            "10.0.0.0/8",
            "172.16.0.0/12",
            "192.168.0.0/16",
            "127.0.0.0/8",
            "169.254.0.0/16",
            "fc00::/7",
            "::1/128",
            "fe80::/10",
        ]
        .iter()
        .filter_map(|range| range.parse().ok())
        .collect()
    })
}

/// True if `network` lies entirely within a private, loopback or
/// link-local range.
pub fn is_private(network: &IpNet) -> bool {
    private_ranges().iter().any(|range| contains_net(range, network))
}

fn contains_net(outer: &IpNet, inner: &IpNet) -> bool {
    match (outer, inner) {
        (IpNet::V4(outer), IpNet::V4(inner)) => outer.contains(inner),
        (IpNet::V6(outer), IpNet::V6(inner)) => outer.contains(inner),
        _ => false,
    }
}

impl NetworkWhitelist {
    /// Parses a list of networks. With `private_only`, every entry must be a
    /// private range.
    pub fn parse<S: AsRef<str>>(
        networks: &[S],
        private_only: bool,
    ) -> Result<Self, AccessControlError> {
        let mut whitelist = Self::default();
        for raw in networks {
            let network = parse_network(raw.as_ref())?;
            if private_only && !is_private(&network) {
                return Err(AccessControlError::NotPrivate {
                    network: raw.as_ref().to_string(),
                });
            }
            whitelist.push(network);
        }
        Ok(whitelist)
    }

    fn push(&mut self, network: IpNet) {
        match network {
            IpNet::V4(net) => self.ipv4.push(net),
            IpNet::V6(net) => self.ipv6.push(net),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    pub fn networks(&self) -> impl Iterator<Item = IpNet> + '_ {
        self.ipv4
            .iter()
            .map(|net| IpNet::V4(*net))
            .chain(self.ipv6.iter().map(|net| IpNet::V6(*net)))
    }

    /// True if `network` is a subnet of some whitelisted network of the same
    /// address family.
    pub fn contains_network(&self, network: &IpNet) -> bool {
        match network {
            IpNet::V4(inner) => self.ipv4.iter().any(|outer| outer.contains(inner)),
            IpNet::V6(inner) => self.ipv6.iter().any(|outer| outer.contains(inner)),
        }
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.contains_network(&IpNet::from(ip))
    }

    /// True if every network in `self` is contained in `other`.
    pub fn is_subset_of(&self, other: &NetworkWhitelist) -> bool {
        self.networks().all(|network| other.contains_network(&network))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_contains_addresses() {
        let list = NetworkWhitelist::parse(&["192.168.1.0/24", "10.0.0.5", "fd00::/8"], false).unwrap();
        assert!(list.contains(ip("192.168.1.34")));
        assert!(list.contains(ip("10.0.0.5")));
        assert!(!list.contains(ip("10.0.0.6")));
        assert!(list.contains(ip("fd00::1")));
        assert!(!list.contains(ip("172.16.0.5")));
    }

    #[test]
    fn test_families_never_cross() {
        let list = NetworkWhitelist::parse(&["0.0.0.0/0"], false).unwrap();
        assert!(!list.contains(ip("::ffff:192.168.1.1")));
        assert!(!list.contains(ip("::1")));
    }

    #[test]
    fn test_subset_requires_subnet_not_overlap() {
        let global = NetworkWhitelist::parse(&["192.168.0.0/16", "fd00::/8"], false).unwrap();

        let inside = NetworkWhitelist::parse(&["192.168.1.0/24", "fd00:1::/32"], false).unwrap();
        assert!(inside.is_subset_of(&global));

        // Overlaps the global range but is larger than it.
        let wider = NetworkWhitelist::parse(&["192.0.0.0/8"], false).unwrap();
        assert!(!wider.is_subset_of(&global));

        let other_family = NetworkWhitelist::parse(&["::1"], false).unwrap();
        assert!(!other_family.is_subset_of(&global));

        assert!(NetworkWhitelist::default().is_subset_of(&global));
    }

    #[test]
    fn test_private_only() {
        assert!(NetworkWhitelist::parse(&["10.1.0.0/16", "127.0.0.1", "fd12::/16"], true).is_ok());

        let err = NetworkWhitelist::parse(&["8.8.8.0/24"], true).unwrap_err();
        assert!(matches!(err, AccessControlError::NotPrivate { .. }));

        // Contains public space as well.
        assert!(NetworkWhitelist::parse(&["10.0.0.0/7"], true).is_err());
    }

    #[test]
    fn test_invalid_networks_rejected() {
        assert!(parse_network("not-an-ip").is_err());
        assert!(parse_network("10.0.0.0/33").is_err());
        assert!(parse_network("10.0.0.1/8").is_err());
        assert_eq!(parse_network(" 10.0.0.1 ").unwrap().prefix_len(), 32);
    }
}
