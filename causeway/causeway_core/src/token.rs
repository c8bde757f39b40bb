//! Token codec for carrying sessions between processes
//!
//! A token is a compact JSON document. `v` and `id` are always present;
//! the remaining fields are omitted when they hold their default:
//!
//! ```text
//! {"baggage":{"tenant":"acme"},"deadline_ms":1700000000000,"hops":1,"id":"...","origin":4,"v":1}
//! ```
//!
//! Decoding treats its input as untrusted: anything that is not a token this
//! codec could have produced is rejected with a [`DecodeError`].

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::TokenConfig;
use crate::error::DecodeError;

/// Header (or metadata key) under which transports carry a token
pub const CONTEXT_HEADER: &str = "X-Causeway-Context";

/// Current wire version
pub const TOKEN_VERSION: u32 = 1;

/// An externalized session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Borrow the wire form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the wire form
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}

/// Everything a token carries about a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPayload {
    /// Session identity
    pub identity: String,

    /// Ordinal of the context that produced the token
    pub origin: Option<u64>,

    /// Process boundaries crossed before the token was produced
    pub hops: u32,

    /// Properties travelling with the session
    pub baggage: BTreeMap<String, String>,

    /// Absolute deadline of the session
    pub deadline: Option<DateTime<Utc>>,
}

impl TokenPayload {
    /// Payload carrying only an identity
    pub fn from_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WireToken {
    #[allow(dead_code)]
    v: u32,
    id: String,
    #[serde(default)]
    origin: Option<u64>,
    #[serde(default)]
    hops: u32,
    #[serde(default)]
    baggage: BTreeMap<String, String>,
    #[serde(default)]
    deadline_ms: Option<i64>,
}

/// Encoder and validating decoder for tokens
#[derive(Debug, Clone)]
pub struct TokenCodec {
    max_token_len: usize,
    max_identity_len: usize,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(&TokenConfig::default())
    }
}

impl TokenCodec {
    /// Create a codec with the configured limits
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            max_token_len: config.max_token_len,
            max_identity_len: config.max_identity_len,
        }
    }

    /// Encode a payload into its wire form
    pub fn encode(&self, payload: &TokenPayload) -> Token {
        let mut doc = Map::new();
        doc.insert("v".to_string(), Value::from(TOKEN_VERSION));
        doc.insert("id".to_string(), Value::from(payload.identity.as_str()));

        if let Some(origin) = payload.origin {
            doc.insert("origin".to_string(), Value::from(origin));
        }

        if payload.hops > 0 {
            doc.insert("hops".to_string(), Value::from(payload.hops));
        }

        if !payload.baggage.is_empty() {
            let baggage: Map<String, Value> = payload
                .baggage
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            doc.insert("baggage".to_string(), Value::Object(baggage));
        }

        if let Some(deadline) = payload.deadline {
            doc.insert(
                "deadline_ms".to_string(),
                Value::from(deadline.timestamp_millis()),
            );
        }

        Token(Value::Object(doc).to_string())
    }

    /// Encode a bare identity
    pub fn encode_identity(&self, identity: &str) -> Token {
        self.encode(&TokenPayload::from_identity(identity))
    }

    /// Decode and validate a token received from elsewhere
    pub fn decode(&self, token: &str) -> Result<TokenPayload, DecodeError> {
        if token.is_empty() {
            return Err(DecodeError::Empty);
        }

        if token.len() > self.max_token_len {
            return Err(DecodeError::TooLong {
                len: token.len(),
                max: self.max_token_len,
            });
        }

        let value: Value = serde_json::from_str(token)?;
        let version = value
            .get("v")
            .and_then(Value::as_u64)
            .ok_or_else(|| DecodeError::Malformed("missing version field".to_string()))?;
        if version != u64::from(TOKEN_VERSION) {
            return Err(DecodeError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }

        let wire: WireToken = serde_json::from_value(value)?;
        let deadline = match wire.deadline_ms {
            Some(ms) => Some(DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
                DecodeError::Malformed(format!("deadline {} out of range", ms))
            })?),
            None => None,
        };

        let payload = TokenPayload {
            identity: wire.id,
            origin: wire.origin,
            hops: wire.hops,
            baggage: wire.baggage,
            deadline,
        };
        self.check(&payload)?;
        Ok(payload)
    }

    /// Check that `payload` encodes to a token this codec accepts.
    ///
    /// The length limit is applied with `origin`, `hops` and `deadline` at
    /// their widest, so a payload that passes keeps passing as it is joined
    /// and re-externalized.
    pub fn check(&self, payload: &TokenPayload) -> Result<(), DecodeError> {
        self.check_identity(&payload.identity)?;

        if payload.baggage.keys().any(|k| k.is_empty()) {
            return Err(DecodeError::Malformed("empty baggage key".to_string()));
        }

        let widest = TokenPayload {
            identity: payload.identity.clone(),
            origin: Some(u64::MAX),
            hops: u32::MAX,
            baggage: payload.baggage.clone(),
            deadline: Some(DateTime::<Utc>::MIN_UTC),
        };
        let len = self.encode(&widest).as_str().len();
        if len > self.max_token_len {
            return Err(DecodeError::TooLong {
                len,
                max: self.max_token_len,
            });
        }

        Ok(())
    }

    /// Decode a token and keep only its identity
    pub fn decode_identity(&self, token: &str) -> Result<String, DecodeError> {
        self.decode(token).map(|payload| payload.identity)
    }

    fn check_identity(&self, identity: &str) -> Result<(), DecodeError> {
        if identity.is_empty() {
            return Err(DecodeError::InvalidIdentity("identity is empty".to_string()));
        }

        if identity.len() > self.max_identity_len {
            return Err(DecodeError::InvalidIdentity(format!(
                "identity is {} bytes, maximum is {}",
                identity.len(),
                self.max_identity_len
            )));
        }

        if identity.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DecodeError::InvalidIdentity(
                "identity contains whitespace or control characters".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::default()
    }

    #[test]
    fn test_identity_round_trip() {
        let token = codec().encode_identity("0b1c-42");
        assert!(token.as_str().contains(r#""id":"0b1c-42""#));
        assert!(!token.as_str().contains("hops"));
        assert_eq!(codec().decode_identity(token.as_str()).unwrap(), "0b1c-42");
    }

    #[test]
    fn test_full_payload_round_trip() {
        let deadline = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let mut payload = TokenPayload::from_identity("abc");
        payload.origin = Some(7);
        payload.hops = 2;
        payload.baggage.insert("tenant".to_string(), "acme".to_string());
        payload.deadline = Some(deadline);

        let token = codec().encode(&payload);
        let decoded = codec().decode(token.as_str()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut payload = TokenPayload::from_identity("abc");
        payload.baggage.insert("b".to_string(), "2".to_string());
        payload.baggage.insert("a".to_string(), "1".to_string());
        assert_eq!(codec().encode(&payload), codec().encode(&payload.clone()));
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert_eq!(codec().decode(""), Err(DecodeError::Empty));

        let small = TokenCodec::new(&TokenConfig {
            max_token_len: 16,
            max_identity_len: 8,
        });
        let token = codec().encode_identity("a-rather-long-identity");
        assert!(matches!(
            small.decode(token.as_str()),
            Err(DecodeError::TooLong { max: 16, .. })
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        // A bare identity is not a token.
        assert!(matches!(
            codec().decode("7f3e1c2a-0000-4000-8000-000000000000"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode("id"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(r#"{"id":"x"}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(r#"{"v":1,"id":"x","extra":true}"#),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            codec().decode(r#"[1,2,3]"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_version() {
        assert_eq!(
            codec().decode(r#"{"v":2,"id":"x"}"#),
            Err(DecodeError::UnsupportedVersion(2))
        );
    }

    #[test]
    fn test_rejects_bad_identity() {
        assert!(matches!(
            codec().decode(r#"{"v":1,"id":""}"#),
            Err(DecodeError::InvalidIdentity(_))
        ));
        assert!(matches!(
            codec().decode(r#"{"v":1,"id":"a b"}"#),
            Err(DecodeError::InvalidIdentity(_))
        ));
        assert!(matches!(
            codec().decode("{\"v\":1,\"id\":\"a\\u0000b\"}"),
            Err(DecodeError::InvalidIdentity(_))
        ));

        let long = "x".repeat(300);
        let token = codec().encode_identity(&long);
        assert!(matches!(
            codec().decode(token.as_str()),
            Err(DecodeError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_deadline() {
        assert!(matches!(
            codec().decode(r#"{"v":1,"id":"x","deadline_ms":9223372036854775807}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_check_matches_decode() {
        let mut payload = TokenPayload::from_identity("abc");
        payload.baggage.insert(String::new(), "v".to_string());
        assert!(matches!(
            codec().check(&payload),
            Err(DecodeError::Malformed(_))
        ));

        let mut payload = TokenPayload::from_identity("abc");
        payload.baggage.insert("blob".to_string(), "x".repeat(5000));
        assert!(matches!(
            codec().check(&payload),
            Err(DecodeError::TooLong { max: 4096, .. })
        ));

        assert!(matches!(
            codec().check(&TokenPayload::from_identity("a b")),
            Err(DecodeError::InvalidIdentity(_))
        ));
    }

    #[test]
    fn test_checked_payload_survives_wider_fields() {
        let limits = TokenConfig {
            max_token_len: 160,
            max_identity_len: 16,
        };
        let codec = TokenCodec::new(&limits);

        // Grow the baggage until the widest rendering no longer fits.
        let mut payload = TokenPayload::from_identity("abc");
        let mut value = String::new();
        loop {
            value.push('x');
            payload.baggage.insert("k".to_string(), value.clone());
            if codec.check(&payload).is_err() {
                value.pop();
                payload.baggage.insert("k".to_string(), value.clone());
                break;
            }
        }

        payload.origin = Some(u64::MAX);
        payload.hops = u32::MAX;
        payload.deadline = DateTime::<Utc>::from_timestamp_millis(-8_000_000_000_000_000);
        let token = codec.encode(&payload);
        assert!(token.as_str().len() <= 160);
        assert_eq!(codec.decode(token.as_str()).unwrap(), payload);
    }
}
