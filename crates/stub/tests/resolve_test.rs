use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use doh_proxy_domain::config::StubConfig;
use doh_proxy_infrastructure::dns::ResponseCache;
use doh_proxy_stub::{create_stub_routes, StubState, UpstreamRelay};
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tower::ServiceExt;

const UPSTREAM_ANSWER: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

/// UDP upstream double answering every A question with a fixed address.
async fn start_upstream() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            let Ok(query) = Message::from_vec(&buf[..len]) else {
                continue;
            };
            let Some(question) = query.queries().first().cloned() else {
                continue;
            };

            let mut reply = Message::new();
            reply.set_id(query.id());
            reply.set_message_type(MessageType::Response);
            reply.set_recursion_available(true);
            reply.add_query(question.clone());
            if question.query_type() == RecordType::A {
                reply.add_answer(Record::from_rdata(
                    question.name().clone(),
                    120,
                    RData::A(A(UPSTREAM_ANSWER)),
                ));
            }
            if let Ok(bytes) = reply.to_vec() {
                let _ = socket.send_to(&bytes, peer).await;
            }
        }
    });

    addr
}

async fn stub_state(upstream: SocketAddr, cache: bool) -> StubState {
    let config = StubConfig {
        upstream: upstream.to_string(),
        cache,
        ..StubConfig::default()
    };
    StubState {
        relay: Arc::new(UpstreamRelay::from_config(&config).unwrap()),
        cache: cache.then(|| Arc::new(ResponseCache::new())),
    }
}

#[tokio::test]
async fn resolve_relays_to_the_classical_upstream() {
    let upstream = start_upstream().await;
    let app = create_stub_routes(stub_state(upstream, false).await);

    let request = Request::builder()
        .uri("/resolve?name=example.com&type=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/dns-message"
    );

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply = Message::from_vec(&body).unwrap();
    assert_eq!(reply.answers().len(), 1);
    match reply.answers()[0].data() {
        Some(RData::A(a)) => assert_eq!(a.0, UPSTREAM_ANSWER),
        other => panic!("unexpected rdata: {other:?}"),
    }
}

#[tokio::test]
async fn cached_answers_survive_the_upstream() {
    let upstream = start_upstream().await;
    let state = stub_state(upstream, true).await;
    let app = create_stub_routes(state);

    let request = Request::builder()
        .uri("/resolve?name=cached.example.com&type=1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // the relay target may be gone; the second answer comes from the cache
    let request = Request::builder()
        .uri("/resolve?name=cached.example.com&type=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let reply = Message::from_vec(&body).unwrap();
    assert_eq!(reply.answers().len(), 1);
}

#[tokio::test]
async fn unreachable_upstream_is_a_service_error() {
    let state = stub_state("127.0.0.1:1".parse().unwrap(), false).await;
    let app = create_stub_routes(state);

    let request = Request::builder()
        .uri("/resolve?name=example.com&type=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn missing_name_is_rejected() {
    let upstream = start_upstream().await;
    let app = create_stub_routes(stub_state(upstream, false).await);

    let request = Request::builder()
        .uri("/resolve?type=1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}
