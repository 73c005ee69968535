use axum::http::{
    HeaderMap, HeaderName,
    header::{ORIGIN, REFERER, USER_AGENT},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Request headers copied into every stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub user_agent: String,
    pub referer: String,
    pub origin: String,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        Self {
            user_agent: header(USER_AGENT),
            referer: header(REFERER),
            origin: header(ORIGIN),
        }
    }
}

/// `2025-01-01T12:00:00Z`
pub fn timestamp_seconds(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `2025-01-01T12:00:00.123456Z`
pub fn timestamp_micros(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub fn into_document(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_request_meta() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://ads.example"));

        let meta = RequestMeta::from_headers(&headers);

        assert_eq!(meta.user_agent, "Mozilla/5.0");
        assert_eq!(meta.referer, "");
        assert_eq!(meta.origin, "https://ads.example");
    }

    #[test]
    fn test_timestamps() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();

        assert_eq!(timestamp_seconds(now), "2025-03-09T14:05:07Z");
        assert_eq!(timestamp_micros(now), "2025-03-09T14:05:07.000000Z");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
        assert_eq!(truncate("ééé", 2), "éé");
    }
}
