use axum::http::HeaderMap;

use crate::config::GatewaySettings;
use crate::error::RelayError;

pub const API_KEY_HEADER: &str = "x-api-key";

pub fn api_key(headers: &HeaderMap) -> Option<String> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// Key masking for logs
pub fn mask_key(key: &str) -> String {
    if key.len() <= 8 || !key.is_ascii() {
        return "****".to_string();
    }
    let (start, end) = (&key[..4], &key[key.len() - 4..]);
    format!("{}****{}", start, end)
}

pub fn ensure_api_key(headers: &HeaderMap, gateway: &GatewaySettings) -> Result<String, RelayError> {
    let Some(key) = api_key(headers) else {
        tracing::warn!("rejected request without {} header", API_KEY_HEADER);
        return Err(RelayError::Unauthorized);
    };
    if !gateway.api_keys.iter().any(|k| k.trim() == key) {
        tracing::warn!(key = %mask_key(&key), "rejected unknown API key");
        return Err(RelayError::Unauthorized);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(key: Option<&str>) -> HeaderMap {
        let mut h = HeaderMap::new();
        if let Some(k) = key {
            h.insert(API_KEY_HEADER, HeaderValue::from_str(k).unwrap());
        }
        h
    }

    fn gateway() -> GatewaySettings {
        GatewaySettings {
            api_keys: vec!["key-one-abcdef".into(), "key-two-ghijkl".into()],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_configured_key() {
        let key = ensure_api_key(&headers(Some("key-two-ghijkl")), &gateway()).unwrap();
        assert_eq!(key, "key-two-ghijkl");
    }

    #[test]
    fn rejects_missing_blank_and_unknown_keys() {
        for h in [headers(None), headers(Some("  ")), headers(Some("nope"))] {
            assert!(matches!(
                ensure_api_key(&h, &gateway()),
                Err(RelayError::Unauthorized)
            ));
        }
    }

    #[test]
    fn mask_key_hides_middle() {
        assert_eq!(mask_key("key-one-abcdef"), "key-****cdef");
        assert_eq!(mask_key("short"), "****");
    }
}
