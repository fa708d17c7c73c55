//! HTTP response policy for the DoH transport.
//!
//! A 301 is followed exactly once, and only to a location that still
//! carries a `dns` query parameter. The statuses a DoH server uses to
//! signal request problems map to classified errors; anything else is
//! returned permissively as the body.

use doh_proxy_domain::DomainError;
use reqwest::header::LOCATION;
use reqwest::{Client, Request};
use tracing::{debug, error, warn};
use url::Url;

pub(crate) async fn fetch(client: &Client, request: Request) -> Result<Vec<u8>, DomainError> {
    let mut request = request;
    let mut redirected = false;

    loop {
        let attempt = request
            .try_clone()
            .ok_or_else(|| DomainError::UpstreamTransport("request not cloneable".to_string()))?;

        let response = match client.execute(attempt).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "upstream HTTP request failed");
                return Err(DomainError::UpstreamTransport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        match status {
            301 if !redirected => {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                warn!(location = %location, "301 Moved Permanently");
                let new_url = Url::parse(&location).map_err(|e| DomainError::UpstreamHttp {
                    status: 301,
                    reason: format!("unparseable redirect location: {e}"),
                })?;
                let has_dns_param = new_url
                    .query_pairs()
                    .any(|(key, value)| key == "dns" && !value.is_empty());
                if !has_dns_param {
                    return Err(DomainError::UpstreamHttp {
                        status: 301,
                        reason: "redirect location carries no dns parameter".to_string(),
                    });
                }
                debug!(url = %new_url, "following redirect once");
                *request.url_mut() = new_url;
                redirected = true;
            }
            301 => {
                return Err(classified(301, "redirected more than once"));
            }
            400 => return Err(classified(400, "Bad Request: may be invalid DNS request")),
            413 => return Err(classified(413, "Payload Too Large")),
            414 => return Err(classified(414, "URI Too Long")),
            415 => {
                return Err(classified(
                    415,
                    "Unsupported Media Type: the request did not have an application/dns-message Content-Type header",
                ))
            }
            429 => {
                return Err(classified(
                    429,
                    "Too Many Requests: the client has sent too many requests in a given amount of time",
                ))
            }
            500 => return Err(classified(500, "Internal Server Error")),
            501 => {
                return Err(classified(
                    501,
                    "Not Implemented: only GET and POST methods are implemented",
                ))
            }
            502 => {
                return Err(classified(
                    502,
                    "Bad Gateway: the DoH service could not contact DNS resolvers",
                ))
            }
            _ => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| DomainError::UpstreamTransport(e.to_string()))?;
                debug!(status, body_len = body.len(), "upstream response received");
                return Ok(body.to_vec());
            }
        }
    }
}

fn classified(status: u16, reason: &str) -> DomainError {
    error!(status, reason, "upstream rejected the query");
    DomainError::UpstreamHttp {
        status,
        reason: reason.to_string(),
    }
}
