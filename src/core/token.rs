//! Bearer token decoding.
//!
//! Tokens are JWT-shaped (`header.payload.signature`, base64url segments).
//! The client never verifies signatures; it only reads `exp` and `sub` to
//! decide whether a stored session is still worth presenting. Every
//! function here fails closed: anything that does not decode cleanly is
//! treated as an invalid token.

use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Subject claim of a token, kept in its string form so numeric and
/// string subjects compare alike.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, author_id: i64) -> bool {
        self.0 == author_id.to_string()
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decodes the payload segment into its JSON object. Claims are read
/// from it one at a time, so a malformed `exp` does not hide `sub`.
fn decode_payload(token: &str) -> Option<Value> {
    if token.is_empty() {
        return None;
    }
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };
    let payload = payload.trim_end_matches('=');
    if payload.is_empty() {
        return None;
    }
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(payload))
        .ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        claims @ Value::Object(_) => Some(claims),
        _ => None,
    }
}

fn expiry(token: &str) -> Option<f64> {
    decode_payload(token)?.get("exp")?.as_f64().filter(|exp| exp.is_finite())
}

/// True only if the token decodes and its expiry is strictly after `now`.
pub fn is_valid_token_at(token: &str, now: DateTime<Utc>) -> bool {
    let Some(exp) = expiry(token) else {
        return false;
    };
    let now_secs = now.timestamp_millis() as f64 / 1000.0;
    exp > now_secs
}

pub fn is_valid_token(token: &str) -> bool {
    is_valid_token_at(token, Utc::now())
}

pub fn get_subject_id(token: &str) -> Option<SubjectId> {
    match decode_payload(token)?.get("sub")? {
        Value::String(sub) if !sub.is_empty() => Some(SubjectId(sub.clone())),
        Value::Number(sub) => Some(SubjectId(sub.to_string())),
        _ => None,
    }
}

/// Expiry claim as a timestamp, for display.
pub fn expires_at(token: &str) -> Option<DateTime<Utc>> {
    let exp = expiry(token)?;
    Utc.timestamp_opt(exp.trunc() as i64, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn encode(claims: &Value) -> String {
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = BASE64_URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_future_expiry_is_valid() {
        let now = Utc::now();
        let token = encode(&json!({"sub": "7", "exp": (now + Duration::hours(1)).timestamp()}));
        assert!(is_valid_token_at(&token, now));
    }

    #[test]
    fn test_past_expiry_is_invalid() {
        let now = Utc::now();
        for offset in [1, 60, 86_400 * 365] {
            let token = encode(&json!({"sub": "7", "exp": now.timestamp() - offset}));
            assert!(!is_valid_token_at(&token, now), "offset {offset}");
        }
    }

    #[test]
    fn test_expiry_equal_to_now_is_invalid() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = encode(&json!({"exp": 1_700_000_000}));
        assert!(!is_valid_token_at(&token, now));
    }

    #[test]
    fn test_missing_expiry_is_invalid() {
        let token = encode(&json!({"sub": "7"}));
        assert!(!is_valid_token(&token));
    }

    #[test]
    fn test_malformed_tokens_fail_closed() {
        let garbage = [
            "",
            ".",
            "..",
            "abc",
            "a.b",
            "a.b.c.d",
            "header.%%%%.sig",
            "header.bm90IGpzb24.sig",
            "header.WyJhcnJheSJd.sig",
        ];
        for token in garbage {
            assert!(!is_valid_token(token), "{token:?} accepted");
            assert_eq!(get_subject_id(token), None, "{token:?} yielded a subject");
        }
    }

    #[test]
    fn test_non_numeric_expiry_is_invalid() {
        let token = encode(&json!({"sub": "7", "exp": "tomorrow"}));
        assert!(!is_valid_token(&token));
    }

    #[test]
    fn test_subject_string_and_number() {
        let token = encode(&json!({"sub": "42", "exp": 1}));
        assert_eq!(get_subject_id(&token).unwrap().as_str(), "42");

        let token = encode(&json!({"sub": 42, "exp": 1}));
        let sub = get_subject_id(&token).unwrap();
        assert!(sub.matches(42));
        assert!(!sub.matches(43));
    }

    #[test]
    fn test_subject_survives_malformed_expiry() {
        let token = encode(&json!({"sub": "9", "exp": "tomorrow"}));
        assert!(!is_valid_token(&token));
        assert_eq!(get_subject_id(&token).unwrap().as_str(), "9");
        assert_eq!(expires_at(&token), None);
    }

    #[test]
    fn test_standard_alphabet_payload_is_accepted() {
        // "~~~" encodes to "fn5+" in the standard alphabet.
        let header = BASE64_URL_SAFE_NO_PAD.encode(b"{}");
        let payload = BASE64_STANDARD_NO_PAD.encode(json!({"sub": "~~~", "exp": 4_000_000_000u64}).to_string());
        assert!(payload.contains('+') || payload.contains('/'));
        let token = format!("{header}.{payload}.sig");
        assert_eq!(get_subject_id(&token).unwrap().as_str(), "~~~");
        assert!(is_valid_token(&token));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let header = BASE64_URL_SAFE_NO_PAD.encode(b"{}");
        let payload = BASE64_URL_SAFE.encode(json!({"sub": "1"}).to_string());
        let token = format!("{header}.{payload}.sig");
        assert_eq!(get_subject_id(&token).unwrap().as_str(), "1");
    }

    #[test]
    fn test_expires_at_reads_claim() {
        let token = encode(&json!({"exp": 1_700_000_000}));
        assert_eq!(expires_at(&token).unwrap().timestamp(), 1_700_000_000);
        assert_eq!(expires_at("nope"), None);
    }
}
