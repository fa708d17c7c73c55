//! URL construction for the three query modes.
//!
//! All three modes pad deterministically: the wire mode pads the packed
//! message itself through the EDNS0 PADDING option, the parameterized
//! modes append a `random_padding` parameter once the rest of the URL is
//! final, so equal-length questions produce equal-length requests.

use data_encoding::BASE64URL_NOPAD;
use doh_proxy_domain::message::name::check_name_length;
use doh_proxy_domain::message::padding::{padding_length, url_safe_token};
use doh_proxy_domain::DomainError;
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use tracing::{debug, warn};
use url::Url;

/// Target length grid for padded requests.
const PADDING_LEAST: usize = 32;
const PADDING_GAIN: usize = 16;

/// GET queries larger than this are oversize for common DoH servers.
const MAX_RAW_QUERY_BYTES: usize = 512;

pub(crate) const PADDING_PARAMETER: &str = "random_padding";
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Pads `msg` in place so its packed form lands on the length grid, then
/// returns the packed bytes.
pub(crate) fn pack_padded(msg: &mut Message) -> Result<Vec<u8>, DomainError> {
    use doh_proxy_domain::message::edns::set_padding;

    set_padding(msg, 0);
    let packed = msg
        .to_vec()
        .map_err(|e| DomainError::MessageEncode(e.to_string()))?;
    let padding = padding_length(packed.len(), PADDING_LEAST, PADDING_GAIN);
    if padding == 0 {
        return Ok(packed);
    }
    set_padding(msg, padding);
    msg.to_vec()
        .map_err(|e| DomainError::MessageEncode(e.to_string()))
}

/// RFC 8484 GET URL: `{endpoint}?dns=<base64url(packed)>`.
pub(crate) fn wire_url(endpoint: &Url, packed: &[u8]) -> Url {
    let mut url = endpoint.clone();
    url.set_query(Some(&format!("dns={}", BASE64URL_NOPAD.encode(packed))));

    let query_len = url.query().map(str::len).unwrap_or(0);
    if query_len > MAX_RAW_QUERY_BYTES {
        warn!(
            query_len,
            max = MAX_RAW_QUERY_BYTES,
            "GET query string is oversize"
        );
    }
    debug!(url = %url, size = url.as_str().len(), "wire request built");
    url
}

/// `resolve`-style GET URL with `name`, `type`, operator parameters, the
/// effective client subnet, optionally `ct`, and deterministic padding.
pub(crate) fn parameterized_url(
    endpoint: &Url,
    qname: &str,
    qtype: RecordType,
    subnet: &str,
    extra_params: &[(String, String)],
    include_ct: bool,
) -> Result<Url, DomainError> {
    check_name_length(qname)?;

    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("name", qname);
        pairs.append_pair("type", &u16::from(qtype).to_string());
        for (key, value) in extra_params {
            pairs.append_pair(key, value);
        }
        if !subnet.is_empty() {
            pairs.append_pair("edns_client_subnet", subnet);
        }
        if include_ct {
            pairs.append_pair("ct", DNS_MESSAGE_CONTENT_TYPE);
        }
    }

    // Account for the parameter name and the `&`/`=` separators the
    // padding itself will add, so the final URL length is deterministic.
    let pre_allocated = url.as_str().len() + PADDING_PARAMETER.len() + "&=".len();
    let padding = padding_length(pre_allocated, PADDING_LEAST, PADDING_GAIN);
    if padding > 0 {
        url.query_pairs_mut()
            .append_pair(PADDING_PARAMETER, &url_safe_token(padding));
    }

    debug!(url = %url, size = url.as_str().len(), "parameterized request built");
    Ok(url)
}
