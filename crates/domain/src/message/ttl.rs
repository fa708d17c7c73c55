use hickory_proto::op::Message;

/// TTL assigned to responses that carry no answer or authority records.
pub const EMPTY_RESPONSE_TTL: u32 = 60;

/// Entries expire after an hour even when upstream hands out longer TTLs.
pub const MAX_CACHE_TTL: u32 = 3600;

/// Minimum TTL across the Answer and Authority sections, clamped to
/// [`MAX_CACHE_TTL`]; an empty response clamps to [`EMPTY_RESPONSE_TTL`].
pub fn min_ttl(msg: &Message) -> u32 {
    if msg.answers().is_empty() && msg.name_servers().is_empty() {
        return EMPTY_RESPONSE_TTL;
    }
    msg.answers()
        .iter()
        .chain(msg.name_servers())
        .map(|record| record.ttl())
        .min()
        .unwrap_or(EMPTY_RESPONSE_TTL)
        .min(MAX_CACHE_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::A;
    use hickory_proto::rr::{Name, RData, Record};
    use std::str::FromStr;

    fn answer(ttl: u32) -> Record {
        Record::from_rdata(
            Name::from_str("example.com.").unwrap(),
            ttl,
            RData::A(A("93.184.216.34".parse().unwrap())),
        )
    }

    #[test]
    fn empty_response_clamps_to_sixty() {
        assert_eq!(min_ttl(&Message::new()), 60);
    }

    #[test]
    fn minimum_spans_answer_and_authority() {
        let mut msg = Message::new();
        msg.add_answer(answer(300));
        msg.add_name_server(answer(120));
        assert_eq!(min_ttl(&msg), 120);
    }

    #[test]
    fn long_ttls_clamp_to_an_hour() {
        let mut msg = Message::new();
        msg.add_answer(answer(86_400));
        assert_eq!(min_ttl(&msg), 3600);
    }

    #[test]
    fn zero_ttl_is_preserved() {
        let mut msg = Message::new();
        msg.add_answer(answer(0));
        assert_eq!(min_ttl(&msg), 0);
    }
}
