use super::file::HostsFile;
use async_trait::async_trait;
use doh_proxy_application::ports::DnsProvider;
use doh_proxy_domain::message::name::canonical_name;
use doh_proxy_domain::message::reply_to;
use doh_proxy_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::IpAddr;
use tracing::debug;

const HOSTS_TTL: u32 = 60;

/// Answers A/AAAA questions from the hosts file, with a pinned answer for
/// the bare name `localhost` and synthetic answers for literal-IP
/// questions.
pub struct HostsFileProvider {
    resolver: HostsFile,
}

impl HostsFileProvider {
    pub fn new() -> Self {
        Self {
            resolver: HostsFile::system(),
        }
    }

    pub fn with_file(resolver: HostsFile) -> Self {
        Self { resolver }
    }
}

impl Default for HostsFileProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DnsProvider for HostsFileProvider {
    async fn query(&self, msg: &Message) -> Result<Message, DomainError> {
        let question = msg
            .queries()
            .first()
            .ok_or_else(|| DomainError::InvalidDomainName("no question in query".to_string()))?;
        let qtype = question.query_type();
        if !matches!(qtype, RecordType::A | RecordType::AAAA) {
            return Err(DomainError::HostsUnsupportedType);
        }

        let qname = canonical_name(&question.name().to_utf8());
        // Some macOS programs resolve names with stray backslashes; strip
        // them before using the name as a lookup key.
        let host = qname.trim_end_matches('.').replace('\\', "");

        let mut reply = reply_to(msg);
        let record_name = question.name().clone();

        if qname == "localhost." {
            let ip: IpAddr = match qtype {
                RecordType::A => IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                _ => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            };
            reply.add_answer(record_from_ip(&record_name, ip));
            return Ok(reply);
        }

        if let Ok(literal) = host.parse::<IpAddr>() {
            let family_matches = match qtype {
                RecordType::A => literal.is_ipv4(),
                _ => literal.is_ipv6(),
            };
            if !family_matches {
                return Err(DomainError::HostsFamilyMismatch);
            }
            reply.add_answer(record_from_ip(&record_name, literal));
            return Ok(reply);
        }

        for addr in self.resolver.lookup_host(&host) {
            let Ok(ip) = addr.parse::<IpAddr>() else {
                continue;
            };
            let family_matches = match qtype {
                RecordType::A => ip.is_ipv4(),
                _ => ip.is_ipv6(),
            };
            if family_matches {
                reply.add_answer(record_from_ip(&record_name, ip));
            }
        }

        if reply.answers().is_empty() {
            return Err(DomainError::HostsMiss);
        }
        debug!(name = %qname, answers = reply.answers().len(), "resolved from hosts file");
        Ok(reply)
    }

    fn source_name(&self) -> &'static str {
        "hosts"
    }
}

fn record_from_ip(name: &Name, ip: IpAddr) -> Record {
    let rdata = match ip {
        IpAddr::V4(v4) => RData::A(A(v4)),
        IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
    };
    Record::from_rdata(name.clone(), HOSTS_TTL, rdata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::Query;
    use std::str::FromStr;

    fn make_query(name: &str, rtype: RecordType) -> Message {
        let mut msg = Message::new();
        msg.set_id(fastrand::u16(..));
        let mut q = Query::new();
        q.set_name(Name::from_str(name).unwrap());
        q.set_query_type(rtype);
        msg.add_query(q);
        msg
    }

    fn provider_with(contents: &str) -> (HostsFileProvider, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, contents).unwrap();
        (
            HostsFileProvider::with_file(HostsFile::with_path(&path)),
            dir,
        )
    }

    #[tokio::test]
    async fn localhost_is_pinned() {
        let (provider, _dir) = provider_with("");
        let reply = provider
            .query(&make_query("localhost.", RecordType::A))
            .await
            .unwrap();
        assert_eq!(reply.answers().len(), 1);
        assert_eq!(reply.answers()[0].ttl(), 60);
        match reply.answers()[0].data() {
            Some(RData::A(a)) => assert_eq!(a.0.to_string(), "127.0.0.1"),
            other => panic!("unexpected rdata: {other:?}"),
        }

        let reply = provider
            .query(&make_query("localhost.", RecordType::AAAA))
            .await
            .unwrap();
        match reply.answers()[0].data() {
            Some(RData::AAAA(a)) => assert_eq!(a.0.to_string(), "::1"),
            other => panic!("unexpected rdata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn answers_matching_family_only() {
        let (provider, _dir) = provider_with("10.0.0.1 foo.local\nfd00::1 foo.local\n");

        let reply = provider
            .query(&make_query("foo.local.", RecordType::A))
            .await
            .unwrap();
        assert_eq!(reply.answers().len(), 1);

        let reply = provider
            .query(&make_query("foo.local.", RecordType::AAAA))
            .await
            .unwrap();
        assert_eq!(reply.answers().len(), 1);
        match reply.answers()[0].data() {
            Some(RData::AAAA(a)) => assert_eq!(a.0.to_string(), "fd00::1"),
            other => panic!("unexpected rdata: {other:?}"),
        }
    }

    #[tokio::test]
    async fn literal_ip_questions_are_synthesized() {
        let (provider, _dir) = provider_with("");
        let reply = provider
            .query(&make_query("192.0.2.7.", RecordType::A))
            .await
            .unwrap();
        match reply.answers()[0].data() {
            Some(RData::A(a)) => assert_eq!(a.0.to_string(), "192.0.2.7"),
            other => panic!("unexpected rdata: {other:?}"),
        }

        let err = provider
            .query(&make_query("192.0.2.7.", RecordType::AAAA))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::HostsFamilyMismatch));
    }

    #[tokio::test]
    async fn unknown_names_and_types_miss() {
        let (provider, _dir) = provider_with("10.0.0.1 foo.local\n");

        let err = provider
            .query(&make_query("bar.local.", RecordType::A))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::HostsMiss));

        let err = provider
            .query(&make_query("foo.local.", RecordType::MX))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::HostsUnsupportedType));
    }

    #[tokio::test]
    async fn identifier_and_question_are_mirrored() {
        let (provider, _dir) = provider_with("10.0.0.1 foo.local\n");
        let query = make_query("foo.local.", RecordType::A);
        let reply = provider.query(&query).await.unwrap();
        assert_eq!(reply.id(), query.id());
        assert_eq!(reply.queries(), query.queries());
    }
}
