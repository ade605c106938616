//! Request descriptors and wire types for the LMS backend API.
//!
//! Wire structs use camelCase serialization to match the API's JSON format.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Access/refresh token pair as issued by login.
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// One field of a multipart form.
///
/// Kept as owned data so a request can be replayed after a token refresh;
/// `reqwest::multipart::Form` can only be sent once.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            bytes,
            mime: None,
        }
    }

    /// Set the MIME type of a file part. No effect on text parts.
    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        if let FormPart::File { ref mut mime, .. } = self {
            *mime = Some(mime_type.into());
        }
        self
    }
}

/// Build a fresh `reqwest` form from owned parts.
pub(crate) fn build_form(parts: &[FormPart]) -> Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
            FormPart::File {
                name,
                file_name,
                bytes,
                mime,
            } => {
                let mut p = Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(m) = mime {
                    p = p.mime_str(m)?;
                }
                form.part(name.clone(), p)
            }
        };
    }
    Ok(form)
}

/// Request payload.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

impl Body {
    pub fn is_multipart(&self) -> bool {
        matches!(self, Body::Multipart(_))
    }
}

/// One logical outbound call.
///
/// Created per call and mutated in place by the client's interceptors.
/// `retried` is the only state carried across a replay; once set it stays set,
/// so a descriptor triggers at most one token refresh.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Body,
    retried: bool,
}

impl RequestDescriptor {
    /// `url` is either a path relative to the base URL or an absolute URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Body::Empty,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        Ok(self.with_body(Body::Json(serde_json::to_value(value)?)))
    }

    pub fn with_multipart(self, parts: Vec<FormPart>) -> Self {
        self.with_body(Body::Multipart(parts))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Whether this descriptor has already been replayed after a refresh.
    pub fn retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Set `Authorization: Bearer <token>`. Returns `false` if the token is
    /// not a valid header value, leaving the header untouched.
    pub(crate) fn set_bearer(&mut self, token: &str) -> bool {
        match bearer_value(token) {
            Some(value) => {
                self.headers.insert(AUTHORIZATION, value);
                true
            }
            None => false,
        }
    }

    /// Let the transport write the multipart boundary header itself.
    pub(crate) fn clear_content_type(&mut self) {
        self.headers.remove(CONTENT_TYPE);
    }
}

/// `Bearer <token>` as a sensitive header value, or `None` if the token
/// contains characters not allowed in a header.
pub(crate) fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// Refresh request body sent to POST /auth/refresh-token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Refresh response. A missing or empty `token` means no new credential.
#[derive(Debug, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub token: Option<String>,
}

/// Login request body sent to POST /auth/login.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Login response from POST /auth/login.
#[derive(Debug, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retried_flag_is_sticky() {
        let mut req = RequestDescriptor::get("/courses");
        assert!(!req.retried());
        req.mark_retried();
        req.mark_retried();
        assert!(req.retried());
    }

    #[test]
    fn bearer_header_is_sensitive() {
        let mut req = RequestDescriptor::get("/courses");
        assert!(req.set_bearer("T1"));
        let value = req.headers().get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer T1");
        assert!(value.is_sensitive());
    }

    #[test]
    fn bearer_rejects_invalid_token() {
        let mut req = RequestDescriptor::get("/courses");
        assert!(!req.set_bearer("bad\ntoken"));
        assert!(req.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn refresh_request_uses_camel_case() {
        let body = serde_json::to_value(RefreshRequest { refresh_token: "R1" }).unwrap();
        assert_eq!(body, serde_json::json!({ "refreshToken": "R1" }));
    }

    #[test]
    fn refresh_response_without_token() {
        let resp: RefreshResponse = serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(resp.token.is_none());
    }

    #[test]
    fn login_response_refresh_token_is_optional() {
        let resp: LoginResponse = serde_json::from_str(r#"{"token":"T1"}"#).unwrap();
        assert_eq!(resp.token, "T1");
        assert!(resp.refresh_token.is_none());
    }

    #[test]
    fn build_form_rejects_bad_mime() {
        let parts = vec![FormPart::file("avatar", "a.png", vec![1, 2, 3]).with_mime("not a mime")];
        assert!(build_form(&parts).is_err());
    }

    #[test]
    fn json_body_and_multipart_detection() {
        let req = RequestDescriptor::post("/courses")
            .with_json(&serde_json::json!({ "title": "Rust" }))
            .unwrap();
        assert!(!req.body().is_multipart());

        let req = RequestDescriptor::post("/uploads").with_multipart(vec![FormPart::text("k", "v")]);
        assert!(req.body().is_multipart());
    }
}
