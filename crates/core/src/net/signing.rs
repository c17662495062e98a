use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::errors::CoreError;

type HmacSha256 = Hmac<Sha256>;

/// Build a query string with parameters sorted by key and URL-encoded values.
///
/// Both venues sign this exact string, so the same output must also be the
/// query that goes on the wire.
pub fn canonical_query(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, CoreError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::ValidationError(format!("Invalid HMAC secret: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Binance signs the query string itself.
pub fn binance_signature(secret: &str, query: &str) -> Result<String, CoreError> {
    hmac_sha256_hex(secret, query)
}

/// Bybit V5 signs `timestamp + api_key + recv_window + query`.
pub fn bybit_signature(
    secret: &str,
    timestamp: &str,
    api_key: &str,
    recv_window: &str,
    query: &str,
) -> Result<String, CoreError> {
    let payload = format!("{timestamp}{api_key}{recv_window}{query}");
    hmac_sha256_hex(secret, &payload)
}

/// Milliseconds since the Unix epoch, as venues expect in signed requests.
pub fn timestamp_millis() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}
