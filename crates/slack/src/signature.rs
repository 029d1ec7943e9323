use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
const SIGNATURE_VERSION: &str = "v0";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing request header `{0}`")]
    MissingHeader(&'static str),
    #[error("request timestamp `{0}` is not a unix timestamp")]
    InvalidTimestamp(String),
    #[error("request timestamp is {age_secs}s away from now; limit is {max_age_secs}s")]
    Stale { age_secs: i64, max_age_secs: u64 },
    #[error("signature is not in `v0=<hex>` form")]
    Malformed,
    #[error("signature does not match request body")]
    Mismatch,
    #[error("signing secret was rejected as an HMAC key")]
    InvalidKey,
}

/// Checks the `v0` HMAC-SHA256 signature Slack attaches to Events API requests.
#[derive(Clone)]
pub struct SignatureVerifier {
    signing_secret: SecretString,
    max_age_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("signing_secret", &"[REDACTED]")
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(signing_secret: SecretString, max_age_secs: u64) -> Self {
        Self { signing_secret, max_age_secs }
    }

    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

        let sent_at: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp.to_owned()))?;
        let age_secs = now_unix.saturating_sub(sent_at).saturating_abs();
        if age_secs.unsigned_abs() > self.max_age_secs {
            return Err(SignatureError::Stale { age_secs, max_age_secs: self.max_age_secs });
        }

        let digest = signature
            .strip_prefix("v0=")
            .and_then(|hex_digest| hex::decode(hex_digest).ok())
            .ok_or(SignatureError::Malformed)?;

        self.mac_for(timestamp, body)?.verify_slice(&digest).map_err(|_| SignatureError::Mismatch)
    }

    /// Produces the header value Slack would send for `body` at `timestamp`.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac_for(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
    }

    fn mac_for(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.signing_secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidKey)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::{SignatureError, SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const NOW: i64 = 1_700_000_000;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new("8f742231b10e8888abcd99yyyzzz85a5".to_owned().into(), 300)
    }

    #[test]
    fn accepts_request_signed_with_same_secret() {
        let verifier = verifier();
        let body = br#"{"type":"event_callback"}"#;
        let timestamp = NOW.to_string();
        let signature = verifier.sign(&timestamp, body).expect("sign");

        assert!(signature.starts_with("v0="));
        assert_eq!(verifier.verify(Some(&timestamp), Some(&signature), body, NOW), Ok(()));
    }

    #[test]
    fn matches_slack_documented_example() {
        let verifier = verifier();
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let timestamp = "1531420618";

        assert_eq!(
            verifier.sign(timestamp, body).expect("sign"),
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn rejects_tampered_body() {
        let verifier = verifier();
        let timestamp = NOW.to_string();
        let signature = verifier.sign(&timestamp, b"original").expect("sign");

        assert_eq!(
            verifier.verify(Some(&timestamp), Some(&signature), b"tampered", NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_stale_timestamps_in_either_direction() {
        let verifier = verifier();
        for sent_at in [NOW - 301, NOW + 301] {
            let timestamp = sent_at.to_string();
            let signature = verifier.sign(&timestamp, b"{}").expect("sign");
            assert!(matches!(
                verifier.verify(Some(&timestamp), Some(&signature), b"{}", NOW),
                Err(SignatureError::Stale { age_secs: 301, max_age_secs: 300 })
            ));
        }
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        let verifier = verifier();
        let timestamp = NOW.to_string();

        assert_eq!(
            verifier.verify(None, Some("v0=00"), b"{}", NOW),
            Err(SignatureError::MissingHeader(TIMESTAMP_HEADER))
        );
        assert_eq!(
            verifier.verify(Some(&timestamp), None, b"{}", NOW),
            Err(SignatureError::MissingHeader(SIGNATURE_HEADER))
        );
        assert_eq!(
            verifier.verify(Some("yesterday"), Some("v0=00"), b"{}", NOW),
            Err(SignatureError::InvalidTimestamp("yesterday".to_owned()))
        );
        assert_eq!(
            verifier.verify(Some(&timestamp), Some("v1=zz"), b"{}", NOW),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn debug_output_hides_secret() {
        let rendered = format!("{:?}", verifier());
        assert!(!rendered.contains("8f742231"));
    }
}
