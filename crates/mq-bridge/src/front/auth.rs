//! Basic credential decoding and the authentication challenge.

use crate::domain::{AuthError, Credential};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

const BASIC_SCHEME: &str = "Basic";

/// Body sent with every challenge.
pub const CHALLENGE_BODY: &str = "auth";

/// Decode `Basic <base64(identity:secret)>`.
///
/// The scheme is matched case-insensitively. The decoded text is split on the
/// first colon; without a colon the whole text is the identity and the
/// secret is empty.
pub fn decode_basic(header_value: &str) -> Result<Credential, AuthError> {
    let (scheme, token) = header_value
        .trim()
        .split_once(' ')
        .ok_or_else(|| AuthError::Scheme("expected '<scheme> <credentials>'".into()))?;

    if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
        return Err(AuthError::Scheme(format!("unsupported scheme '{}'", scheme)));
    }

    let decoded = BASE64
        .decode(token.trim())
        .map_err(|e| AuthError::Scheme(format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(decoded)
        .map_err(|_| AuthError::Scheme("credentials are not valid UTF-8".into()))?;

    Ok(match text.split_once(':') {
        Some((identity, secret)) => Credential::new(identity, secret),
        None => Credential::new(text, ""),
    })
}

/// Credential from the request's `Authorization` header.
pub fn credential_from_headers(headers: &HeaderMap) -> Result<Credential, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::Missing)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::Scheme("authorization header is not visible ASCII".into()))?;
    decode_basic(value)
}

/// `401` asking the caller for Basic credentials in `realm`.
pub fn challenge(realm: &str) -> Response {
    let value = format!("{} realm=\"{}\"", BASIC_SCHEME, realm.replace('"', "'"));
    let mut response = (StatusCode::UNAUTHORIZED, CHALLENGE_BODY).into_response();
    if let Ok(value) = HeaderValue::from_str(&value) {
        response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
