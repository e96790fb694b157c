//! Check outcome types.
//!
//! Every retrieval check produces exactly one [OutcomeRecord]. The
//! record is created empty when the check starts, each stage of the
//! check writes the fields it owns, and nothing is ever thrown across
//! the check boundary: every failure mode collapses into one
//! [OutcomeCode].

use crate::Timestamp;

/// The closed status-code taxonomy for a retrieval check.
///
/// The numeric codes are a stable contract for downstream
/// aggregation and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeCode {
    /// The literal upstream HTTP status. 200 is the only success
    /// value; 5xx statuses are surfaced verbatim here too.
    Http(u16),

    /// The transport threw before any HTTP response was obtained.
    NoHttpResponse,

    /// The provider address host type is unsupported.
    UnsupportedHostType,

    /// The provider address transport is not tcp.
    UnsupportedTransport,

    /// The provider address scheme is unsupported or missing.
    UnsupportedScheme,

    /// The provider address has extraneous trailing parts.
    TooManyParts,

    /// The provider address path segment is invalid or empty.
    InvalidPath,

    /// DNS resolution failed.
    DnsFailure,

    /// The TCP connection was refused.
    ConnectionRefused,

    /// The requested content id uses a hash algorithm we have not
    /// implemented.
    UnsupportedHash,

    /// The block payload does not hash to the requested content id.
    HashMismatch,

    /// The returned block is not the block that was asked for.
    UnexpectedBlock,

    /// The content-addressed archive could not be parsed.
    MalformedCar,
}

impl OutcomeCode {
    /// The numeric wire value of this code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Http(code) => *code,
            Self::NoHttpResponse => 600,
            Self::UnsupportedHostType => 701,
            Self::UnsupportedTransport => 702,
            Self::UnsupportedScheme => 703,
            Self::TooManyParts => 704,
            Self::InvalidPath => 705,
            Self::DnsFailure => 801,
            Self::ConnectionRefused => 802,
            Self::UnsupportedHash => 901,
            Self::HashMismatch => 902,
            Self::UnexpectedBlock => 903,
            Self::MalformedCar => 904,
        }
    }

    /// True only for a fully verified retrieval.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Http(200))
    }
}

impl From<u16> for OutcomeCode {
    fn from(code: u16) -> Self {
        match code {
            600 => Self::NoHttpResponse,
            701 => Self::UnsupportedHostType,
            702 => Self::UnsupportedTransport,
            703 => Self::UnsupportedScheme,
            704 => Self::TooManyParts,
            705 => Self::InvalidPath,
            801 => Self::DnsFailure,
            802 => Self::ConnectionRefused,
            901 => Self::UnsupportedHash,
            902 => Self::HashMismatch,
            903 => Self::UnexpectedBlock,
            904 => Self::MalformedCar,
            oth => Self::Http(oth),
        }
    }
}

impl serde::Serialize for OutcomeCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u16(self.as_u16())
    }
}

impl<'de> serde::Deserialize<'de> for OutcomeCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code: u16 = serde::Deserialize::deserialize(deserializer)?;
        Ok(code.into())
    }
}

/// The retrieval transports a check can exercise.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain HTTP block retrieval.
    Http,

    /// Retrieval through an external graphsync-capable fetcher.
    Graphsync,
}

/// The index lookup verdict reported with a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexerResult {
    /// The index advertises an HTTP retrieval for this provider.
    Ok,

    /// Only graphsync is advertised; the check fell back to it.
    HttpNotAdvertised,

    /// No usable advertisement from the assigned provider.
    NoValidAdvertisement,

    /// The index lookup failed before yielding an HTTP status.
    ErrorFetch,

    /// The index lookup failed with this HTTP status.
    Error(u16),
}

impl std::fmt::Display for IndexerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::HttpNotAdvertised => f.write_str("HTTP_NOT_ADVERTISED"),
            Self::NoValidAdvertisement => {
                f.write_str("NO_VALID_ADVERTISEMENT")
            }
            Self::ErrorFetch => f.write_str("ERROR_FETCH"),
            Self::Error(code) => write!(f, "ERROR_{code}"),
        }
    }
}

impl serde::Serialize for IndexerResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for IndexerResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "OK" => Self::Ok,
            "HTTP_NOT_ADVERTISED" => Self::HttpNotAdvertised,
            "NO_VALID_ADVERTISEMENT" => Self::NoValidAdvertisement,
            "ERROR_FETCH" => Self::ErrorFetch,
            oth => match oth
                .strip_prefix("ERROR_")
                .and_then(|c| c.parse().ok())
            {
                Some(code) => Self::Error(code),
                None => {
                    return Err(serde::de::Error::custom(format!(
                        "unknown indexer result: {oth}"
                    )))
                }
            },
        })
    }
}

/// The mutable accumulator for one retrieval check.
///
/// Fields are append-only: each check stage fills in the fields it
/// owns and later stages never overwrite earlier ones. Once the check
/// completes the record is handed to the reporter and not touched
/// again.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRecord {
    /// The final outcome classification, one row of the taxonomy.
    pub status_code: Option<OutcomeCode>,

    /// HEAD probe result: the HTTP status, or 600 if the probe threw
    /// before any response was obtained.
    pub head_status_code: Option<u16>,

    /// Whether the fetch timed out or failed without classification.
    pub timeout: bool,

    /// When the fetch request was issued.
    pub start_at: Option<Timestamp>,

    /// When the first body byte arrived.
    pub first_byte_at: Option<Timestamp>,

    /// When the check completed.
    pub end_at: Option<Timestamp>,

    /// Whether the size cap aborted the read mid-stream.
    pub car_too_large: bool,

    /// Total body bytes received, including a capped prefix.
    pub byte_length: u64,

    /// Hex multihash-prefixed sha2-256 digest of the entire fetched
    /// byte stream; only set for a fully received body.
    pub car_checksum: Option<String>,

    /// The transport the check used.
    pub protocol: Option<Protocol>,

    /// The provider address the transport dialed.
    pub provider_address: Option<String>,

    /// The index lookup verdict.
    pub indexer_result: Option<IndexerResult>,
}

impl OutcomeRecord {
    /// Construct an empty record for a check that is about to start.
    pub fn new() -> Self {
        Self {
            status_code: None,
            head_status_code: None,
            timeout: false,
            start_at: None,
            first_byte_at: None,
            end_at: None,
            car_too_large: false,
            byte_length: 0,
            car_checksum: None,
            protocol: None,
            provider_address: None,
            indexer_result: None,
        }
    }
}

impl Default for OutcomeRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// A completed check, ready for submission: the outcome record plus
/// the identity of the check and of this station.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// The content id that was checked.
    pub content_id: String,

    /// The storage provider that was checked.
    pub provider_id: String,

    /// The station that ran the check.
    pub station_id: String,

    /// The checker software version.
    pub client_version: String,

    /// The runtime the checker was built against.
    pub runtime_version: String,

    /// The outcome record, flattened into the same JSON object.
    #[serde(flatten)]
    pub record: OutcomeRecord,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_fixtures() {
        const F: &[(OutcomeCode, u16)] = &[
            (OutcomeCode::Http(200), 200),
            (OutcomeCode::Http(502), 502),
            (OutcomeCode::NoHttpResponse, 600),
            (OutcomeCode::UnsupportedHostType, 701),
            (OutcomeCode::UnsupportedTransport, 702),
            (OutcomeCode::UnsupportedScheme, 703),
            (OutcomeCode::TooManyParts, 704),
            (OutcomeCode::InvalidPath, 705),
            (OutcomeCode::DnsFailure, 801),
            (OutcomeCode::ConnectionRefused, 802),
            (OutcomeCode::UnsupportedHash, 901),
            (OutcomeCode::HashMismatch, 902),
            (OutcomeCode::UnexpectedBlock, 903),
            (OutcomeCode::MalformedCar, 904),
        ];

        for (code, num) in F.iter() {
            assert_eq!(*num, code.as_u16());
            assert_eq!(*code, OutcomeCode::from(*num));
            assert_eq!(
                num.to_string(),
                serde_json::to_string(code).unwrap(),
            );
        }

        assert!(OutcomeCode::Http(200).is_success());
        assert!(!OutcomeCode::Http(404).is_success());
        assert!(!OutcomeCode::HashMismatch.is_success());
    }

    #[test]
    fn indexer_result_strings() {
        const F: &[(&str, IndexerResult)] = &[
            ("OK", IndexerResult::Ok),
            ("HTTP_NOT_ADVERTISED", IndexerResult::HttpNotAdvertised),
            (
                "NO_VALID_ADVERTISEMENT",
                IndexerResult::NoValidAdvertisement,
            ),
            ("ERROR_FETCH", IndexerResult::ErrorFetch),
            ("ERROR_503", IndexerResult::Error(503)),
        ];

        for (s, r) in F.iter() {
            assert_eq!(*s, r.to_string());
            assert_eq!(
                format!("\"{s}\""),
                serde_json::to_string(r).unwrap(),
            );
            let d: IndexerResult =
                serde_json::from_str(&format!("\"{s}\"")).unwrap();
            assert_eq!(*r, d);
        }
    }

    #[test]
    fn measurement_wire_format() {
        let m = Measurement {
            content_id: "bafytest".into(),
            provider_id: "f010".into(),
            station_id: "some-station-id".into(),
            client_version: "0.1.0".into(),
            runtime_version: "rustc".into(),
            record: OutcomeRecord::new(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&m).unwrap())
                .unwrap();
        assert_eq!("bafytest", json["contentId"]);
        assert_eq!("some-station-id", json["stationId"]);
        // flattened record fields live on the same object
        assert_eq!(serde_json::Value::Null, json["statusCode"]);
        assert_eq!(false, json["timeout"]);
        assert_eq!(0, json["byteLength"]);
    }
}
