use crate::state::StubState;
use crate::subnet_policy::subnet_allowed;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use doh_proxy_domain::message::edns::{set_client_subnet, ClientSubnet};
use doh_proxy_domain::message::name::canonical_name;
use doh_proxy_domain::DomainError;
use doh_proxy_infrastructure::dns::doh::DNS_MESSAGE_CONTENT_TYPE;
use hickory_proto::op::{Message, MessageType, OpCode};
use hickory_proto::rr::{Name, RecordType};
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub rtype: String,
    #[serde(default)]
    pub edns_client_subnet: String,
    #[serde(default)]
    pub ct: String,
}

pub async fn resolve(
    State(state): State<StubState>,
    Query(params): Query<ResolveParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(accept) = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()) {
        if !accept.is_empty() && accept != "*/*" && accept != DNS_MESSAGE_CONTENT_TYPE {
            error!(accept, "request content type not supported");
            return plain(StatusCode::FORBIDDEN, "request content type not supported.");
        }
    }

    let query = match synthesize_query(&params) {
        Ok(query) => query,
        Err(e) => {
            error!(error = %e, "get message from request failed");
            return plain(StatusCode::BAD_GATEWAY, "get message from request failed.");
        }
    };

    if let Some(cache) = &state.cache {
        if let Some(reply) = cache.get(&query) {
            info!(name = %params.name, "resolved from cache");
            return wire(reply);
        }
    }

    match state.relay.exchange(&query).await {
        Ok(reply) => {
            if let Some(cache) = &state.cache {
                cache.insert(&reply);
            }
            info!(name = %params.name, "resolved from upstream");
            wire(reply)
        }
        Err(e) => {
            error!(error = %e, "error when querying upstream");
            plain(
                StatusCode::SERVICE_UNAVAILABLE,
                "error when querying upstream.",
            )
        }
    }
}

fn wire(reply: Message) -> Response {
    match reply.to_vec() {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "error when encoding response");
            plain(
                StatusCode::SERVICE_UNAVAILABLE,
                "error when encoding response.",
            )
        }
    }
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// Builds the upstream query from the URL parameters: fresh identifier,
/// RD and AD set, the name canonicalized, the subnet installed unless the
/// name falls under the exception list.
pub(crate) fn synthesize_query(params: &ResolveParams) -> Result<Message, DomainError> {
    if !params.ct.is_empty() && params.ct != DNS_MESSAGE_CONTENT_TYPE {
        return Err(DomainError::InvalidDomainName(format!(
            "content type not supported: {}",
            params.ct
        )));
    }

    let qname = canonical_name(&params.name);
    if qname == "." {
        return Err(DomainError::InvalidDomainName(
            "question name invalid".to_string(),
        ));
    }
    let name = Name::from_str(&qname)
        .map_err(|e| DomainError::InvalidDomainName(format!("question name invalid: {e}")))?;

    let rtype: u16 = params
        .rtype
        .parse()
        .map_err(|_| DomainError::InvalidDomainName("question type invalid".to_string()))?;

    let mut msg = Message::new();
    msg.set_id(fastrand::u16(..));
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.set_authentic_data(true);
    let mut question = hickory_proto::op::Query::new();
    question.set_name(name);
    question.set_query_type(RecordType::from(rtype));
    msg.add_query(question);

    if !params.edns_client_subnet.is_empty() && subnet_allowed(&qname) {
        match parse_subnet(&params.edns_client_subnet) {
            Some(subnet) => set_client_subnet(&mut msg, &subnet),
            None => {
                info!(
                    name = %qname,
                    subnet = %params.edns_client_subnet,
                    "question subnet skipped"
                );
            }
        }
    }

    Ok(msg)
}

/// Accepts `net/mask` or a bare address; a bare address gets the
/// host-length prefix of its family.
fn parse_subnet(raw: &str) -> Option<ClientSubnet> {
    if let Ok(subnet) = ClientSubnet::from_cidr(raw) {
        return Some(subnet);
    }
    let ip: IpAddr = raw.parse().ok()?;
    let (family, source_prefix) = match ip {
        IpAddr::V4(_) => (1, 32),
        IpAddr::V6(_) => (2, 128),
    };
    Some(ClientSubnet {
        family,
        source_prefix,
        scope_prefix: 0,
        address: ip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use doh_proxy_domain::message::edns::client_subnet;

    fn params(name: &str, rtype: &str) -> ResolveParams {
        ResolveParams {
            name: name.to_string(),
            rtype: rtype.to_string(),
            edns_client_subnet: String::new(),
            ct: String::new(),
        }
    }

    #[test]
    fn synthesizes_a_recursive_query() {
        let msg = synthesize_query(&params("Example.COM", "1")).unwrap();
        assert_eq!(msg.queries()[0].name().to_utf8(), "example.com.");
        assert_eq!(msg.queries()[0].query_type(), RecordType::A);
        assert!(msg.recursion_desired());
        assert!(msg.authentic_data());
        assert_eq!(msg.message_type(), MessageType::Query);
    }

    #[test]
    fn rejects_missing_name_and_bad_type() {
        assert!(synthesize_query(&params("", "1")).is_err());
        assert!(synthesize_query(&params("example.com", "A")).is_err());
        assert!(synthesize_query(&params("example.com", "")).is_err());
    }

    #[test]
    fn rejects_foreign_content_type() {
        let mut p = params("example.com", "1");
        p.ct = "application/json".to_string();
        assert!(synthesize_query(&p).is_err());

        p.ct = DNS_MESSAGE_CONTENT_TYPE.to_string();
        assert!(synthesize_query(&p).is_ok());
    }

    #[test]
    fn cidr_subnet_is_installed() {
        let mut p = params("example.com", "1");
        p.edns_client_subnet = "203.0.113.0/24".to_string();
        let msg = synthesize_query(&p).unwrap();
        let subnet = client_subnet(&msg).unwrap();
        assert_eq!(subnet.source_prefix, 24);
        assert_eq!(subnet.family, 1);
    }

    #[test]
    fn bare_ip_subnet_gets_host_prefix() {
        let mut p = params("example.com", "1");
        p.edns_client_subnet = "203.0.113.9".to_string();
        let msg = synthesize_query(&p).unwrap();
        let subnet = client_subnet(&msg).unwrap();
        assert_eq!(subnet.source_prefix, 32);

        p.edns_client_subnet = "2001:db8::1".to_string();
        let msg = synthesize_query(&p).unwrap();
        let subnet = client_subnet(&msg).unwrap();
        assert_eq!(subnet.source_prefix, 128);
        assert_eq!(subnet.family, 2);
    }

    #[test]
    fn exception_domains_travel_without_subnet() {
        let mut p = params("www.google.com", "1");
        p.edns_client_subnet = "203.0.113.0/24".to_string();
        let msg = synthesize_query(&p).unwrap();
        assert!(client_subnet(&msg).is_none());
    }

    #[test]
    fn garbage_subnet_is_skipped_not_fatal() {
        let mut p = params("example.com", "1");
        p.edns_client_subnet = "not-a-subnet".to_string();
        let msg = synthesize_query(&p).unwrap();
        assert!(client_subnet(&msg).is_none());
    }

    fn state() -> StubState {
        use doh_proxy_domain::config::StubConfig;
        let relay = crate::relay::UpstreamRelay::from_config(&StubConfig {
            upstream: "9.9.9.9".to_string(),
            ..StubConfig::default()
        })
        .unwrap();
        StubState {
            relay: std::sync::Arc::new(relay),
            cache: None,
        }
    }

    #[tokio::test]
    async fn foreign_accept_header_is_forbidden() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        let response = resolve(
            State(state()),
            Query(params("example.com", "1")),
            headers,
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unparseable_requests_are_rejected_before_any_relay() {
        let response = resolve(State(state()), Query(params("", "1")), HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let mut accept_any = HeaderMap::new();
        accept_any.insert(header::ACCEPT, "*/*".parse().unwrap());
        let response = resolve(
            State(state()),
            Query(params("example.com", "not-a-number")),
            accept_any,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
