use doh_proxy_application::ports::DnsProvider;
use doh_proxy_infrastructure::dns::hosts::{HostsFile, HostsFileProvider};
use hickory_proto::rr::RecordType;

mod helpers;
use helpers::builders::MessageBuilder;

#[tokio::test]
async fn hosts_answers_with_sixty_second_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 foo.local\n").unwrap();

    let provider = HostsFileProvider::with_file(HostsFile::with_path(&path));
    let query = MessageBuilder::query("foo.local.", RecordType::A);
    let reply = provider.query(&query).await.unwrap();

    assert_eq!(reply.answers().len(), 1);
    assert_eq!(reply.answers()[0].ttl(), 60);
}

#[tokio::test]
async fn changes_within_the_cache_window_are_not_seen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 foo.local\n").unwrap();

    let hosts = HostsFile::with_path(&path);
    assert_eq!(hosts.lookup_host("foo.local"), vec!["10.0.0.1"]);

    // rewritten immediately; the snapshot is still inside its age window
    std::fs::write(&path, "10.0.0.2 foo.local\n").unwrap();
    assert_eq!(hosts.lookup_host("foo.local"), vec!["10.0.0.1"]);
}

#[tokio::test]
async fn provider_misses_fall_through() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 foo.local\n").unwrap();

    let provider = HostsFileProvider::with_file(HostsFile::with_path(&path));
    let query = MessageBuilder::query("absent.local.", RecordType::A);
    assert!(provider.query(&query).await.is_err());
}
