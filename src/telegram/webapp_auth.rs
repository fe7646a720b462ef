//! Telegram Web App init data validation.

use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Init data that passed validation.
#[derive(Debug, Clone)]
pub struct VerifiedInitData {
    pub user_id: i64,
    /// Every signed field except `hash`, URL-decoded
    pub fields: BTreeMap<String, String>,
}

/// Why init data was rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("missing hash parameter")]
    MissingHash,
    #[error("invalid hash - data may be tampered")]
    InvalidHash,
    #[error("init data is too old ({0} seconds)")]
    Expired(i64),
    #[error("malformed init data: {0}")]
    Malformed(String),
}

fn parse_pairs(init_data: &str) -> BTreeMap<String, String> {
    init_data
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let decoded = urlencoding::decode(value).ok()?;
            Some((key.to_string(), decoded.into_owned()))
        })
        .collect()
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts keys of any size"),
    };
    mac.update(data);
    mac
}

/// `key=value` lines of every field but `hash`, sorted by key.
fn data_check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .filter(|(key, _)| key.as_str() != "hash")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Signs init data fields the way Telegram does. Returns the hex hash.
pub fn sign_init_data(fields: &BTreeMap<String, String>, bot_token: &str) -> String {
    let secret_key = hmac_sha256(b"WebAppData", bot_token.as_bytes()).finalize().into_bytes();
    let mac = hmac_sha256(&secret_key, data_check_string(fields).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Validates Telegram Web App init data.
///
/// The secret key is `HMAC_SHA256("WebAppData", bot_token)`; the hash is the
/// HMAC of the sorted `key=value` lines with that key. `auth_date` must be
/// at most `max_age_secs` old relative to `now`.
pub fn verify_init_data(
    init_data: &str,
    bot_token: &str,
    max_age_secs: i64,
    now: i64,
) -> Result<VerifiedInitData, InitDataError> {
    let mut fields = parse_pairs(init_data);
    let received_hash = fields.remove("hash").ok_or(InitDataError::MissingHash)?;
    let received = hex::decode(received_hash.trim()).map_err(|_| InitDataError::InvalidHash)?;

    let secret_key = hmac_sha256(b"WebAppData", bot_token.as_bytes()).finalize().into_bytes();
    // Constant-time comparison
    hmac_sha256(&secret_key, data_check_string(&fields).as_bytes())
        .verify_slice(&received)
        .map_err(|_| InitDataError::InvalidHash)?;

    let auth_date = fields
        .get("auth_date")
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| InitDataError::Malformed("missing auth_date".to_string()))?;
    let age = now - auth_date;
    if age > max_age_secs {
        return Err(InitDataError::Expired(age));
    }

    let user_id = user_id_from_fields(&fields).map_err(|e| InitDataError::Malformed(e.to_string()))?;
    Ok(VerifiedInitData { user_id, fields })
}

/// Validates init data against the current time; returns the user id.
pub fn validate_telegram_webapp_data(init_data: &str, bot_token: &str, max_age_secs: i64) -> Result<i64> {
    let now = chrono::Utc::now().timestamp();
    let verified = verify_init_data(init_data, bot_token, max_age_secs, now)?;
    Ok(verified.user_id)
}

fn user_id_from_fields(fields: &BTreeMap<String, String>) -> Result<i64> {
    let user_json = fields.get("user").ok_or_else(|| anyhow!("Missing user parameter"))?;

    let user: serde_json::Value =
        serde_json::from_str(user_json).map_err(|e| anyhow!("Failed to parse user JSON: {}", e))?;

    user.get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| anyhow!("Missing user id in user JSON"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-TOKEN";

    fn signed(auth_date: i64, token: &str) -> String {
        let mut fields = BTreeMap::new();
        fields.insert("auth_date".to_string(), auth_date.to_string());
        fields.insert("query_id".to_string(), "AAE".to_string());
        fields.insert("user".to_string(), r#"{"id":42,"first_name":"Ann"}"#.to_string());
        let hash = sign_init_data(&fields, token);

        let mut pairs: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        pairs.push(format!("hash={}", hash));
        pairs.join("&")
    }

    #[test]
    fn test_valid_init_data() {
        let data = signed(1_000, TOKEN);
        let verified = verify_init_data(&data, TOKEN, 300, 1_100).unwrap();
        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.fields.get("query_id").map(String::as_str), Some("AAE"));
        assert!(!verified.fields.contains_key("hash"));
    }

    #[test]
    fn test_wrong_token_is_rejected() {
        let data = signed(1_000, "other:token");
        assert_eq!(
            verify_init_data(&data, TOKEN, 300, 1_000).unwrap_err(),
            InitDataError::InvalidHash
        );
    }

    #[test]
    fn test_tampered_field_is_rejected() {
        let data = signed(1_000, TOKEN).replace("AAE", "AAF");
        assert_eq!(
            verify_init_data(&data, TOKEN, 300, 1_000).unwrap_err(),
            InitDataError::InvalidHash
        );
    }

    #[test]
    fn test_expired_init_data() {
        let data = signed(1_000, TOKEN);
        assert_eq!(
            verify_init_data(&data, TOKEN, 300, 1_301).unwrap_err(),
            InitDataError::Expired(301)
        );
    }

    #[test]
    fn test_missing_hash() {
        let init_data = "user={\"id\":123}&auth_date=1234567890";
        assert_eq!(
            verify_init_data(init_data, TOKEN, 300, 1_234_567_890).unwrap_err(),
            InitDataError::MissingHash
        );
    }
}
