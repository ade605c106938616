//! Keep tokens out of log output.

use std::borrow::Cow;

use reqwest::header::{HeaderMap, AUTHORIZATION};

const BEARER_PREFIX: &str = "Bearer ";

/// JSON fields whose string values are replaced.
const TOKEN_FIELDS: [&str; 3] = ["\"token\"", "\"refreshToken\"", "\"accessToken\""];

/// Replace every bearer token in `input` with `REDACTED`.
pub fn redact_bearer(input: &str) -> Cow<'_, str> {
    if !input.contains(BEARER_PREFIX) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find(BEARER_PREFIX) {
        out.push_str(&rest[..idx + BEARER_PREFIX.len()]);
        rest = &rest[idx + BEARER_PREFIX.len()..];
        let consumed = rest
            .find(|c: char| c.is_whitespace() || c == '"' || c == ',' || c == ';')
            .unwrap_or(rest.len());
        out.push_str("REDACTED");
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Replace the string values of token-bearing JSON fields, e.g. in error bodies.
pub fn redact_json_tokens(input: &str) -> Cow<'_, str> {
    if !TOKEN_FIELDS.iter().any(|f| input.contains(f)) {
        return Cow::Borrowed(input);
    }

    let mut redacted = input.to_string();
    for field in TOKEN_FIELDS {
        let mut out = String::with_capacity(redacted.len());
        let mut rest = redacted.as_str();
        while let Some(idx) = rest.find(field) {
            let after_key = idx + field.len();
            out.push_str(&rest[..after_key]);
            rest = &rest[after_key..];

            // Expect `: "value"`; anything else is left untouched.
            let trimmed = rest.trim_start();
            let Some(value) = trimmed.strip_prefix(':').map(str::trim_start) else {
                continue;
            };
            let Some(value) = value.strip_prefix('"') else {
                continue;
            };
            let Some(end) = value.find('"') else {
                continue;
            };
            let prefix_len = rest.len() - value.len();
            out.push_str(&rest[..prefix_len]);
            out.push_str("REDACTED");
            rest = &value[end..];
        }
        out.push_str(rest);
        redacted = out;
    }
    Cow::Owned(redacted)
}

/// Render headers for verbose logging with the authorization value masked.
pub fn format_headers(headers: &HeaderMap) -> String {
    let mut parts: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            if *name == AUTHORIZATION {
                format!("{}: Bearer REDACTED", name)
            } else {
                format!("{}: {}", name, value.to_str().unwrap_or("<binary>"))
            }
        })
        .collect();
    parts.sort();
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE};

    #[test]
    fn redacts_bearer_tokens() {
        let out = redact_bearer("Authorization: Bearer abc.def-ghi, other");
        assert_eq!(out, "Authorization: Bearer REDACTED, other");
    }

    #[test]
    fn leaves_plain_text_borrowed() {
        assert!(matches!(redact_bearer("no tokens here"), Cow::Borrowed(_)));
        assert!(matches!(redact_json_tokens("{\"id\":1}"), Cow::Borrowed(_)));
    }

    #[test]
    fn redacts_json_token_fields() {
        let out = redact_json_tokens(r#"{"token": "T2", "refreshToken":"R1", "user":"ana"}"#);
        assert_eq!(out, r#"{"token": "REDACTED", "refreshToken":"REDACTED", "user":"ana"}"#);
    }

    #[test]
    fn non_string_token_field_is_untouched() {
        let out = redact_json_tokens(r#"{"token": null}"#);
        assert_eq!(out, r#"{"token": null}"#);
    }

    #[test]
    fn header_formatting_masks_authorization() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer T1"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let rendered = format_headers(&headers);
        assert_eq!(rendered, "authorization: Bearer REDACTED, content-type: application/json");
        assert!(!rendered.contains("T1"));
    }
}
