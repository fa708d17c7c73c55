#![allow(dead_code)]
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::str::FromStr;

pub struct MessageBuilder;

impl MessageBuilder {
    pub fn query(name: &str, rtype: RecordType) -> Message {
        let mut msg = Message::new();
        msg.set_id(fastrand::u16(..));
        msg.set_recursion_desired(true);
        let mut q = Query::new();
        q.set_name(Name::from_str(name).expect("valid name"));
        q.set_query_type(rtype);
        msg.add_query(q);
        msg
    }

    pub fn response_for(query: &Message, addr: &str, ttl: u32) -> Message {
        let mut reply = doh_proxy_domain::message::reply_to(query);
        let name = query.queries()[0].name().clone();
        let rdata = match addr.parse::<std::net::IpAddr>().expect("valid address") {
            std::net::IpAddr::V4(v4) => RData::A(A(v4)),
            std::net::IpAddr::V6(v6) => RData::AAAA(AAAA(v6)),
        };
        reply.add_answer(Record::from_rdata(name, ttl, rdata));
        reply
    }
}
