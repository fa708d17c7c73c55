use doh_proxy_domain::message::edns;
use doh_proxy_domain::message::name::canonical_name;
use hickory_proto::op::Message;

/// Deterministic cache key for a query: header flags that change the
/// semantics of an answer, the canonicalized question, and the client
/// subnet. The identifier and padding are deliberately excluded. hickory
/// rejects messages with a non-zero Z bit, so it is rendered as a
/// constant.
pub fn fingerprint(msg: &Message) -> Option<String> {
    let question = msg.queries().first()?;
    let subnet = edns::client_subnet(msg)
        .map(|s| s.to_string())
        .unwrap_or_default();

    Some(format!(
        "[OPCODE:{}][TC:{}][RD:{}][Z:false][CD:{}][QName:{}][QType:{}][QClass:{}][EDNS0Subnet:{}]",
        u8::from(msg.op_code()),
        msg.truncated(),
        msg.recursion_desired(),
        msg.checking_disabled(),
        canonical_name(&question.name().to_utf8()),
        u16::from(question.query_type()),
        u16::from(question.query_class()),
        subnet,
    ))
}
