//! Anonymous per-browser identity carried in a long-lived cookie.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::middleware::Next;
use axum::response::Response;
use meetspace_common::UserId;
use tracing::{debug, warn};

pub const IDENTITY_COOKIE: &str = "meetspace_uid";

/// One year.
const IDENTITY_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Find a well-formed identity among the request's cookie headers.
pub fn identity_from_headers(headers: &axum::http::HeaderMap) -> Option<UserId> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|header| token_from_cookie_header(header, IDENTITY_COOKIE))
        .find_map(UserId::parse_token)
}

pub fn identity_cookie(user_id: &UserId) -> String {
    format!(
        "{IDENTITY_COOKIE}={user_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={IDENTITY_MAX_AGE_SECS}"
    )
}

/// Resolve the caller's identity, creating one on first contact.
///
/// The identity is exposed to handlers as an `Extension<UserId>` and the
/// cookie is re-issued on every response so its lifetime slides forward.
pub async fn ensure_identity(mut request: Request, next: Next) -> Response {
    let user_id = match identity_from_headers(request.headers()) {
        Some(id) => id,
        None => {
            let id = UserId::new();
            debug!("assigned new identity {id}");
            id
        }
    };

    request.extensions_mut().insert(user_id.clone());
    let mut response = next.run(request).await;

    match HeaderValue::from_str(&identity_cookie(&user_id)) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!("failed to encode identity cookie: {e}"),
    }

    response
}
