//! Wire-level entry point shared by the UDP and TCP listeners: decode,
//! run the query use case, encode. Failures never leave the client
//! without an answer as long as the inbound header was readable.

use doh_proxy_application::HandleDnsQueryUseCase;
use doh_proxy_domain::message::server_failure;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::{debug, error};

pub struct DnsServerHandler {
    use_case: Arc<HandleDnsQueryUseCase>,
}

impl DnsServerHandler {
    pub fn new(use_case: Arc<HandleDnsQueryUseCase>) -> Self {
        Self { use_case }
    }

    /// Handles one wire-format query and returns the wire-format reply.
    /// `None` means the input was too mangled to even address a failure
    /// response to.
    pub async fn handle(&self, wire: &[u8]) -> Option<Vec<u8>> {
        let query = match Message::from_vec(wire) {
            Ok(query) => query,
            Err(e) => {
                error!(error = %e, "malformed query");
                return failure_wire_from_raw(wire);
            }
        };

        match self.use_case.execute(&query).await {
            Ok(response) => match response.to_vec() {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    error!(error = %e, "can't pack response");
                    server_failure(&query).to_vec().ok()
                }
            },
            Err(e) => {
                debug!(error = %e, "query failed, answering SERVFAIL");
                server_failure(&query).to_vec().ok()
            }
        }
    }
}

/// Builds a bare SERVFAIL header when only the raw identifier is usable.
fn failure_wire_from_raw(wire: &[u8]) -> Option<Vec<u8>> {
    if wire.len() < 2 {
        return None;
    }
    let mut header = vec![0u8; 12];
    header[0] = wire[0];
    header[1] = wire[1];
    header[2] = 0x80; // QR
    header[3] = 0x02; // RCODE = SERVFAIL
    Some(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_failure_echoes_identifier() {
        let wire = vec![0xab, 0xcd, 0x01, 0x00, 0x00, 0x01];
        let failure = failure_wire_from_raw(&wire).unwrap();
        assert_eq!(failure.len(), 12);
        assert_eq!(&failure[..2], &[0xab, 0xcd]);
        assert_eq!(failure[2] & 0x80, 0x80);
        assert_eq!(failure[3] & 0x0f, 0x02);
    }

    #[test]
    fn hopeless_input_yields_nothing() {
        assert!(failure_wire_from_raw(&[0x42]).is_none());
    }
}
