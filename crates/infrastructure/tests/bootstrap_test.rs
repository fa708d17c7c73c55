use doh_proxy_infrastructure::dns::BootstrapResolver;
use std::sync::Arc;

mod helpers;
use helpers::dns_server_mock::MockDnsServer;

#[tokio::test]
async fn first_use_resolves_synchronously() {
    let server = MockDnsServer::start().await.unwrap();
    let resolver = Arc::new(BootstrapResolver::new(&server.addr().to_string()).unwrap());

    let (ip4s, ip6s) = resolver.resolve("doh.example").await;
    assert!(ip4s.contains(&MockDnsServer::A_ANSWER));
    assert!(ip6s.contains(&MockDnsServer::AAAA_ANSWER));
}

#[tokio::test]
async fn repeated_lookups_are_served_from_the_memo() {
    let server = MockDnsServer::start().await.unwrap();
    let resolver = Arc::new(BootstrapResolver::new(&server.addr().to_string()).unwrap());

    let first = resolver.resolve("doh.example").await;
    drop(server); // answers must now come from the memo
    let second = resolver.resolve("doh.example").await;
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
}

#[tokio::test]
async fn unreachable_resolver_yields_empty_sets() {
    // reserved port with nothing listening
    let resolver = Arc::new(BootstrapResolver::new("127.0.0.1:1").unwrap());
    let (ip4s, ip6s) = resolver.resolve("doh.example").await;
    assert!(ip4s.is_empty());
    assert!(ip6s.is_empty());
}
