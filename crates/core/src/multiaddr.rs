//! Provider address resolution.
//!
//! Storage providers advertise self-describing multiaddrs such as
//! `/ip4/127.0.0.1/tcp/80/http` or
//! `/dns/example.com/https/http-path/%2Fblocks`. This module converts
//! them into plain HTTP(S) urls. Pure parsing, no I/O.

use spotcheck_api::outcome::OutcomeCode;

/// Typed failures produced when resolving a multiaddr.
///
/// Each failure maps to exactly one row of the outcome taxonomy; the
/// retrieval engine records the mapped code and never dials.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultiaddrError {
    /// The host type segment is not one we can dial.
    #[error("unsupported multiaddr host type \"{0}\"")]
    UnsupportedHostType(String),

    /// The transport segment is missing or not tcp.
    #[error("unsupported multiaddr transport \"{0}\"")]
    UnsupportedTransport(String),

    /// The scheme segment is missing or not http/https.
    #[error("unsupported multiaddr scheme")]
    UnsupportedScheme,

    /// Unconsumed trailing segments remain.
    #[error("multiaddr has too many parts")]
    TooManyParts,

    /// The http-path segment does not percent-decode, or decodes to
    /// nothing.
    #[error("invalid multiaddr http path")]
    InvalidPath,
}

impl From<&MultiaddrError> for OutcomeCode {
    fn from(e: &MultiaddrError) -> Self {
        match e {
            MultiaddrError::UnsupportedHostType(_) => {
                OutcomeCode::UnsupportedHostType
            }
            MultiaddrError::UnsupportedTransport(_) => {
                OutcomeCode::UnsupportedTransport
            }
            MultiaddrError::UnsupportedScheme => {
                OutcomeCode::UnsupportedScheme
            }
            MultiaddrError::TooManyParts => OutcomeCode::TooManyParts,
            MultiaddrError::InvalidPath => OutcomeCode::InvalidPath,
        }
    }
}

/// Convert a provider multiaddr into an HTTP(S) url.
///
/// Two shapes are accepted:
///
/// - `/<host-type>/<host>/tcp/<port>/<scheme>`
/// - `/<host-type>/<host>/<scheme>/http-path/<encoded-path>`
///
/// Default ports (80 for http, 443 for https) are elided from the
/// produced url; any other port is rendered explicitly.
pub fn multiaddr_to_http_url(
    addr: &str,
) -> Result<String, MultiaddrError> {
    let (multi_addr, http_path) = match addr.split_once("/http-path") {
        Some((head, tail)) => (head, Some(tail)),
        None => (addr, None),
    };

    let mut parts = multi_addr.split('/');
    // a well-formed multiaddr starts with '/', producing one empty
    // leading segment
    let _ = parts.next();
    let host_type = parts.next().unwrap_or_default();
    let host_value = parts.next().unwrap_or_default();

    let scheme;
    let mut port = None;
    let mut path = None;

    if let Some(http_path) = http_path {
        scheme = parts.next();
        path = Some(decode_http_path(http_path)?);
    } else {
        let transport = parts.next().unwrap_or_default();
        port = parts.next();
        scheme = parts.next();

        if transport != "tcp" {
            return Err(MultiaddrError::UnsupportedTransport(
                transport.to_string(),
            ));
        }
    }

    if parts.next().is_some() {
        return Err(MultiaddrError::TooManyParts);
    }

    let scheme = match scheme {
        Some(s @ "http") | Some(s @ "https") => s,
        _ => return Err(MultiaddrError::UnsupportedScheme),
    };

    let host = match host_type {
        "ip4" | "dns" | "dns4" | "dns6" => host_value.to_string(),
        // literal v6 addresses go in brackets per RFC 2732
        "ip6" => format!("[{host_value}]"),
        oth => {
            return Err(MultiaddrError::UnsupportedHostType(
                oth.to_string(),
            ))
        }
    };

    let mut url = format!("{scheme}://{host}");
    if let Some(port) = port {
        let is_default = (scheme == "http" && port == "80")
            || (scheme == "https" && port == "443");
        if !is_default {
            url.push(':');
            url.push_str(port);
        }
    }
    if let Some(path) = path {
        if !path.starts_with('/') {
            url.push('/');
        }
        url.push_str(&path);
    }
    Ok(url)
}

fn decode_http_path(src: &str) -> Result<String, MultiaddrError> {
    let trimmed = src.trim_start_matches('/');
    let decoded = percent_decode(trimmed)?;
    if decoded.is_empty() {
        return Err(MultiaddrError::InvalidPath);
    }
    Ok(decoded)
}

fn percent_decode(src: &str) -> Result<String, MultiaddrError> {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = |b: Option<&u8>| {
                b.and_then(|b| (*b as char).to_digit(16))
            };
            match (hex(bytes.get(i + 1)), hex(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => out.push((hi * 16 + lo) as u8),
                _ => return Err(MultiaddrError::InvalidPath),
            }
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| MultiaddrError::InvalidPath)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fixture_parse() {
        const F: &[(&str, &str)] = &[
            ("/ip4/127.0.0.1/tcp/80/http", "http://127.0.0.1"),
            ("/ip4/127.0.0.1/tcp/8080/http", "http://127.0.0.1:8080"),
            ("/ip6/::1/tcp/443/https", "https://[::1]"),
            ("/ip6/::1/tcp/8443/https", "https://[::1]:8443"),
            ("/dns/example.com/tcp/443/https", "https://example.com"),
            ("/dns4/example.com/tcp/80/http", "http://example.com"),
            ("/dns6/example.com/tcp/8443/https", "https://example.com:8443"),
            (
                "/dns/meridian.space/http/http-path/%2Fipni-provider%2FproviderID",
                "http://meridian.space/ipni-provider/providerID",
            ),
        ];

        for (addr, url) in F.iter() {
            assert_eq!(
                Ok(url.to_string()),
                multiaddr_to_http_url(addr),
                "addr: {addr}"
            );
        }
    }

    #[test]
    fn fixture_no_parse() {
        let f: &[(&str, MultiaddrError)] = &[
            (
                "/ip99/1.2.3.4.5/tcp/80/http",
                MultiaddrError::UnsupportedHostType("ip99".into()),
            ),
            (
                "/ip4/1.2.3.4/udp/80/http",
                MultiaddrError::UnsupportedTransport("udp".into()),
            ),
            (
                "/ip4/1.2.3.4/tcp/80/ldap",
                MultiaddrError::UnsupportedScheme,
            ),
            // with an http-path, the scheme follows the host directly;
            // a tcp/port pair in that position leaves trailing parts
            (
                "/dns/meridian.space/tcp/8080/http/http-path/%2Ffoo",
                MultiaddrError::TooManyParts,
            ),
            (
                "/ip4/1.2.3.4/tcp/80/http/p2p/pubkey",
                MultiaddrError::TooManyParts,
            ),
            // trailing parts take precedence over a bad scheme
            (
                "/ip4/1.2.3.4/tcp/80/ldap/extra",
                MultiaddrError::TooManyParts,
            ),
            (
                "/dns/meridian.space/http/http-path/invalid%path",
                MultiaddrError::InvalidPath,
            ),
            (
                "/dns/meridian.space/http/http-path/",
                MultiaddrError::InvalidPath,
            ),
            ("/dns/example.com/http", MultiaddrError::UnsupportedTransport("http".into())),
        ];

        for (addr, err) in f.iter() {
            assert_eq!(
                Err(err.clone()),
                multiaddr_to_http_url(addr),
                "addr: {addr}"
            );
        }
    }

    #[test]
    fn outcome_code_mapping() {
        let f: &[(MultiaddrError, u16)] = &[
            (MultiaddrError::UnsupportedHostType("x".into()), 701),
            (MultiaddrError::UnsupportedTransport("udp".into()), 702),
            (MultiaddrError::UnsupportedScheme, 703),
            (MultiaddrError::TooManyParts, 704),
            (MultiaddrError::InvalidPath, 705),
        ];

        for (err, code) in f.iter() {
            assert_eq!(*code, OutcomeCode::from(err).as_u16());
        }
    }
}
