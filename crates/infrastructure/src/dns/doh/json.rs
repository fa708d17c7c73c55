//! Translation of the Google JSON DNS format into a DNS message.
//!
//! Records are rebuilt as typed rdata from the `data` strings; types the
//! translation does not know are logged and skipped, mirroring how
//! unparseable records are treated.

use doh_proxy_domain::message::reply_to;
use doh_proxy_domain::DomainError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, MX, NS, PTR, SOA, TXT};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub(crate) struct JsonDnsResponse {
    #[serde(rename = "Status", default)]
    pub status: i32,
    #[serde(rename = "TC", default)]
    pub tc: bool,
    #[serde(rename = "RD", default)]
    pub rd: bool,
    #[serde(rename = "RA", default)]
    pub ra: bool,
    #[serde(rename = "AD", default)]
    pub ad: bool,
    #[serde(rename = "CD", default)]
    pub cd: bool,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<JsonRecord>,
    #[serde(rename = "Authority", default)]
    pub authority: Vec<JsonRecord>,
    #[serde(rename = "Comment", default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JsonRecord {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub rtype: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    #[serde(default)]
    pub data: String,
}

/// Builds the reply message for `query` from a decoded JSON response.
pub(crate) fn message_from_json(json: &JsonDnsResponse, query: &Message) -> Message {
    let mut msg = reply_to(query);
    msg.set_truncated(json.tc);
    msg.set_recursion_desired(json.rd);
    msg.set_recursion_available(json.ra);
    msg.set_authentic_data(json.ad);
    msg.set_checking_disabled(json.cd);
    msg.set_response_code(response_code_from_status(json.status));

    if !json.comment.is_empty() {
        info!(comment = %json.comment, "upstream comment");
    }

    for record in translate_records(&json.answer, "answer") {
        msg.add_answer(record);
    }
    for record in translate_records(&json.authority, "authority") {
        msg.add_name_server(record);
    }
    msg
}

fn translate_records(records: &[JsonRecord], section: &str) -> Vec<Record> {
    let mut translated = Vec::with_capacity(records.len());
    for record in records {
        match record_from_json(record) {
            Ok(record) => translated.push(record),
            Err(e) => {
                error!(
                    section,
                    name = %record.name,
                    rtype = record.rtype,
                    error = %e,
                    "unable to translate record"
                );
            }
        }
    }
    translated
}

fn record_from_json(record: &JsonRecord) -> Result<Record, DomainError> {
    let name = Name::from_str(&record.name)
        .map_err(|e| DomainError::InvalidDnsResponse(format!("record name: {e}")))?;
    let data = record.data.trim();
    let rtype = RecordType::from(record.rtype);

    let rdata = match rtype {
        RecordType::A => RData::A(A(data
            .parse()
            .map_err(|_| invalid(rtype, data))?)),
        RecordType::AAAA => RData::AAAA(AAAA(data
            .parse()
            .map_err(|_| invalid(rtype, data))?)),
        RecordType::CNAME => RData::CNAME(CNAME(parse_name(rtype, data)?)),
        RecordType::NS => RData::NS(NS(parse_name(rtype, data)?)),
        RecordType::PTR => RData::PTR(PTR(parse_name(rtype, data)?)),
        RecordType::MX => {
            let (preference, exchange) = data
                .split_once(' ')
                .ok_or_else(|| invalid(rtype, data))?;
            let preference = preference.parse().map_err(|_| invalid(rtype, data))?;
            RData::MX(MX::new(preference, parse_name(rtype, exchange)?))
        }
        RecordType::TXT => {
            let chunks: Vec<String> = data
                .split('"')
                .filter(|chunk| !chunk.trim().is_empty())
                .map(|chunk| chunk.to_string())
                .collect();
            if chunks.is_empty() {
                RData::TXT(TXT::new(vec![data.to_string()]))
            } else {
                RData::TXT(TXT::new(chunks))
            }
        }
        RecordType::SOA => {
            let fields: Vec<&str> = data.split_whitespace().collect();
            if fields.len() != 7 {
                return Err(invalid(rtype, data));
            }
            RData::SOA(SOA::new(
                parse_name(rtype, fields[0])?,
                parse_name(rtype, fields[1])?,
                fields[2].parse().map_err(|_| invalid(rtype, data))?,
                fields[3].parse().map_err(|_| invalid(rtype, data))?,
                fields[4].parse().map_err(|_| invalid(rtype, data))?,
                fields[5].parse().map_err(|_| invalid(rtype, data))?,
                fields[6].parse().map_err(|_| invalid(rtype, data))?,
            ))
        }
        other => {
            return Err(DomainError::InvalidDnsResponse(format!(
                "unsupported record type {other} in JSON response"
            )))
        }
    };

    Ok(Record::from_rdata(name, record.ttl, rdata))
}

fn parse_name(rtype: RecordType, raw: &str) -> Result<Name, DomainError> {
    Name::from_str(raw).map_err(|_| invalid(rtype, raw))
}

fn invalid(rtype: RecordType, data: &str) -> DomainError {
    DomainError::InvalidDnsResponse(format!("bad {rtype} record data: {data}"))
}

fn response_code_from_status(status: i32) -> ResponseCode {
    match status {
        0 => ResponseCode::NoError,
        1 => ResponseCode::FormErr,
        2 => ResponseCode::ServFail,
        3 => ResponseCode::NXDomain,
        4 => ResponseCode::NotImp,
        5 => ResponseCode::Refused,
        6 => ResponseCode::YXDomain,
        7 => ResponseCode::YXRRSet,
        8 => ResponseCode::NXRRSet,
        9 => ResponseCode::NotAuth,
        10 => ResponseCode::NotZone,
        _ => ResponseCode::ServFail,
    }
}
