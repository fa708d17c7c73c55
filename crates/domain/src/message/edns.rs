use crate::errors::DomainError;
use hickory_proto::op::{Edns, Message};
use hickory_proto::rr::rdata::opt::{EdnsCode, EdnsOption};
use ipnet::IpNet;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// EDNS0 option code for CLIENT_SUBNET (RFC 7871).
pub const CLIENT_SUBNET_CODE: u16 = 8;
/// EDNS0 option code for PADDING (RFC 7830).
pub const PADDING_CODE: u16 = 12;

const EDNS_MAX_PAYLOAD: u16 = 4096;

/// An EDNS0 CLIENT_SUBNET option. Family is 1 for IPv4, 2 for IPv6, and 0
/// exactly when the source netmask is 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSubnet {
    pub family: u16,
    pub source_prefix: u8,
    pub scope_prefix: u8,
    pub address: IpAddr,
}

impl ClientSubnet {
    pub fn from_cidr(cidr: &str) -> Result<Self, DomainError> {
        let net: IpNet = cidr
            .parse()
            .map_err(|_| DomainError::InvalidCidr(cidr.to_string()))?;
        Ok(Self::from_net(&net))
    }

    pub fn from_net(net: &IpNet) -> Self {
        let source_prefix = net.prefix_len();
        let family = if source_prefix == 0 {
            0
        } else if net.network().is_ipv4() {
            1
        } else {
            2
        };
        Self {
            family,
            source_prefix,
            scope_prefix: 0,
            address: net.network(),
        }
    }

    /// RFC 7871 §6 wire form: family, source prefix, scope prefix, then
    /// only the significant address octets.
    pub fn to_wire(&self) -> Vec<u8> {
        let octets = match self.address {
            IpAddr::V4(v4) => v4.octets().to_vec(),
            IpAddr::V6(v6) => v6.octets().to_vec(),
        };
        let significant = (usize::from(self.source_prefix) + 7) / 8;
        let mut wire = Vec::with_capacity(4 + significant);
        wire.extend_from_slice(&self.family.to_be_bytes());
        wire.push(self.source_prefix);
        wire.push(self.scope_prefix);
        wire.extend_from_slice(&octets[..significant.min(octets.len())]);
        wire
    }

    pub fn from_wire(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let family = u16::from_be_bytes([data[0], data[1]]);
        let source_prefix = data[2];
        let scope_prefix = data[3];
        let address = match family {
            1 => {
                let mut octets = [0u8; 4];
                let n = (data.len() - 4).min(4);
                octets[..n].copy_from_slice(&data[4..4 + n]);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            2 => {
                let mut octets = [0u8; 16];
                let n = (data.len() - 4).min(16);
                octets[..n].copy_from_slice(&data[4..4 + n]);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            0 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            _ => return None,
        };
        Some(Self {
            family,
            source_prefix,
            scope_prefix,
            address,
        })
    }
}

impl fmt::Display for ClientSubnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.source_prefix)
    }
}

/// Reads the CLIENT_SUBNET option from a message, when present.
pub fn client_subnet(msg: &Message) -> Option<ClientSubnet> {
    let edns = msg.extensions().as_ref()?;
    match edns.options().get(EdnsCode::Subnet) {
        Some(EdnsOption::Unknown(_, data)) => ClientSubnet::from_wire(data),
        _ => None,
    }
}

/// Replaces (or installs) the CLIENT_SUBNET option on a message.
pub fn set_client_subnet(msg: &mut Message, subnet: &ClientSubnet) {
    insert_option(msg, EdnsOption::Unknown(CLIENT_SUBNET_CODE, subnet.to_wire()));
}

/// Reinstates the client's original subnet, or strips the option when the
/// inbound query carried none.
pub fn restore_client_subnet(msg: &mut Message, subnet: Option<&ClientSubnet>) {
    match subnet {
        Some(subnet) => set_client_subnet(msg, subnet),
        None => {
            if let Some(edns) = msg.extensions_mut().as_mut() {
                edns.options_mut().remove(EdnsCode::Subnet);
            }
        }
    }
}

/// Replaces (or installs) a zero-filled PADDING option of `length` bytes.
pub fn set_padding(msg: &mut Message, length: usize) {
    insert_option(msg, EdnsOption::Unknown(PADDING_CODE, vec![0u8; length]));
}

fn insert_option(msg: &mut Message, option: EdnsOption) {
    match msg.extensions_mut().as_mut() {
        Some(edns) => {
            edns.options_mut().insert(option);
        }
        None => {
            let mut edns = Edns::new();
            edns.set_max_payload(EDNS_MAX_PAYLOAD);
            edns.set_version(0);
            edns.options_mut().insert(option);
            msg.set_edns(edns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_parses_into_network_address() {
        let subnet = ClientSubnet::from_cidr("203.0.113.9/24").unwrap();
        assert_eq!(subnet.family, 1);
        assert_eq!(subnet.source_prefix, 24);
        assert_eq!(subnet.address.to_string(), "203.0.113.0");
        assert_eq!(subnet.to_string(), "203.0.113.0/24");
    }

    #[test]
    fn ipv6_cidr_maps_to_family_two() {
        let subnet = ClientSubnet::from_cidr("2001:db8::/64").unwrap();
        assert_eq!(subnet.family, 2);
        assert_eq!(subnet.source_prefix, 64);
    }

    #[test]
    fn zero_netmask_yields_family_zero() {
        let subnet = ClientSubnet::from_cidr("0.0.0.0/0").unwrap();
        assert_eq!(subnet.family, 0);
        assert_eq!(subnet.source_prefix, 0);
        assert_eq!(subnet.to_wire(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn invalid_cidr_is_rejected() {
        assert!(ClientSubnet::from_cidr("not-a-subnet").is_err());
        assert!(ClientSubnet::from_cidr("203.0.113.9").is_err());
    }

    #[test]
    fn wire_roundtrip_truncates_to_significant_octets() {
        let subnet = ClientSubnet::from_cidr("203.0.113.9/32").unwrap();
        let wire = subnet.to_wire();
        assert_eq!(wire.len(), 4 + 4);
        let parsed = ClientSubnet::from_wire(&wire).unwrap();
        assert_eq!(parsed, subnet);

        let subnet = ClientSubnet::from_cidr("10.0.0.0/8").unwrap();
        let wire = subnet.to_wire();
        assert_eq!(wire.len(), 4 + 1);
        let parsed = ClientSubnet::from_wire(&wire).unwrap();
        assert_eq!(parsed.address.to_string(), "10.0.0.0");
    }

    #[test]
    fn message_roundtrip_through_edns() {
        let mut msg = Message::new();
        assert!(client_subnet(&msg).is_none());

        let subnet = ClientSubnet::from_cidr("203.0.113.0/24").unwrap();
        set_client_subnet(&mut msg, &subnet);
        assert_eq!(client_subnet(&msg), Some(subnet.clone()));

        let replacement = ClientSubnet::from_cidr("2001:db8::/64").unwrap();
        set_client_subnet(&mut msg, &replacement);
        assert_eq!(client_subnet(&msg), Some(replacement));

        restore_client_subnet(&mut msg, Some(&subnet));
        assert_eq!(client_subnet(&msg), Some(subnet));

        restore_client_subnet(&mut msg, None);
        assert!(client_subnet(&msg).is_none());
    }

    #[test]
    fn padding_roundtrips_through_pack() {
        let mut msg = Message::new();
        set_padding(&mut msg, 12);
        let packed = msg.to_vec().unwrap();
        let reparsed = Message::from_vec(&packed).unwrap();
        let edns = reparsed.extensions().as_ref().unwrap();
        match edns.options().get(EdnsCode::Padding) {
            Some(EdnsOption::Unknown(code, data)) => {
                assert_eq!(*code, PADDING_CODE);
                assert_eq!(data.len(), 12);
            }
            other => panic!("unexpected padding option: {other:?}"),
        }
    }
}
