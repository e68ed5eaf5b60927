//! AWS Signature Version 4 request signing for S3-compatible backends.
//!
//! Only the subset needed by `RemoteAssetBackend` is implemented: path-style
//! requests without query strings, signing `host`, `x-amz-content-sha256`
//! and `x-amz-date`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedHeaders {
    pub amz_date: String,
    pub content_sha256: String,
    /// `None` for anonymous requests (empty access key).
    pub authorization: Option<String>,
}

pub(crate) struct Credentials<'a> {
    pub access_key: &'a str,
    pub secret_key: &'a str,
    pub region: &'a str,
}

/// Signs one request. `path` must already be URI-encoded.
pub(crate) fn sign(
    credentials: &Credentials<'_>,
    method: &str,
    host: &str,
    path: &str,
    payload: &[u8],
    now: DateTime<Utc>,
) -> SignedHeaders {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let content_sha256 = hex::encode(Sha256::digest(payload));

    if credentials.access_key.is_empty() {
        return SignedHeaders {
            amz_date,
            content_sha256,
            authorization: None,
        };
    }

    let date = now.format("%Y%m%d").to_string();
    let scope = format!("{date}/{}/{SERVICE}/aws4_request", credentials.region);
    let canonical_request = format!(
        "{method}\n{path}\n\nhost:{host}\nx-amz-content-sha256:{content_sha256}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{content_sha256}"
    );
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = signing_key(credentials.secret_key, &date, credentials.region);
    let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes()));

    SignedHeaders {
        amz_date,
        content_sha256,
        authorization: Some(format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            credentials.access_key
        )),
    }
}

/// Percent-encodes one path segment per the S3 canonical URI rules.
pub(crate) fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

fn signing_key(secret_key: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, SERVICE.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::{encode_segment, sign, Credentials};
    use chrono::{TimeZone, Utc};

    fn credentials() -> Credentials<'static> {
        Credentials {
            access_key: "AKIDEXAMPLE",
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            region: "us-east-1",
        }
    }

    #[test]
    fn empty_payload_hash_is_well_known() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let headers = sign(&credentials(), "HEAD", "localhost:9000", "/bucket", b"", now);
        assert_eq!(headers.amz_date, "20240102T030405Z");
        assert_eq!(
            headers.content_sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn authorization_header_is_deterministic_and_payload_bound() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let first = sign(&credentials(), "PUT", "localhost:9000", "/b/k.png", b"one", now);
        let again = sign(&credentials(), "PUT", "localhost:9000", "/b/k.png", b"one", now);
        let other = sign(&credentials(), "PUT", "localhost:9000", "/b/k.png", b"two", now);

        let auth = first.authorization.clone().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240102/us-east-1/s3/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        let signature = auth.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert_eq!(first, again);
        assert_ne!(first.authorization, other.authorization);
    }

    #[test]
    fn anonymous_requests_are_not_signed() {
        let anonymous = Credentials {
            access_key: "",
            secret_key: "",
            region: "us-east-1",
        };
        let headers = sign(&anonymous, "GET", "localhost", "/b", b"", Utc::now());
        assert!(headers.authorization.is_none());
    }

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("a b/c~d.png"), "a%20b%2Fc~d.png");
    }
}
