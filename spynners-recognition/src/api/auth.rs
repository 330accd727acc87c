//! Bearer identity
//!
//! The platform session token is `base64("<user_id>:<rest>")`. The token is
//! opaque to this service beyond recovering the user id for history keying.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use base64::{engine::general_purpose, Engine as _};

/// User id carried by the request's bearer token, if it decodes
pub fn bearer_user_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    user_id_from_token(token.trim())
}

/// Text before the first `:` of the decoded token
pub fn user_id_from_token(token: &str) -> Option<String> {
    let decoded = general_purpose::STANDARD
        .decode(token)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(token))
        .ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let user_id = text.split(':').next()?.trim();
    if user_id.is_empty() {
        None
    } else {
        Some(user_id.to_string())
    }
}
