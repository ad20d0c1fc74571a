//! Session id from the `sid` cookie, and the Set-Cookie values that issue or clear it.

use crate::session::SessionStore;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use uuid::Uuid;

/// Cookie name carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

/// Extractor for the optional session id. A missing or malformed cookie yields `None`.
#[derive(Clone, Debug)]
pub struct SessionCookie(pub Option<Uuid>);

#[async_trait]
impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionCookie(session_id_from_headers(&parts.headers)))
    }
}

pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// Set-Cookie value for a new session.
pub fn session_cookie(store: &SessionStore, id: Uuid) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        id,
        store.ttl().as_secs()
    );
    if store.secure_cookies() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value that clears the session cookie.
pub fn expired_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    #[test]
    fn finds_sid_among_other_cookies() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; sid={}; lang=en", id)).unwrap(),
        );
        assert_eq!(session_id_from_headers(&headers), Some(id));
    }

    #[test]
    fn malformed_sid_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sid=not-a-uuid"));
        assert_eq!(session_id_from_headers(&headers), None);
        assert_eq!(session_id_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_attributes() {
        let store = SessionStore::new(Duration::from_secs(3600));
        let id = Uuid::new_v4();
        let cookie = session_cookie(&store, id);
        assert!(cookie.starts_with(&format!("sid={};", id)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
        let secure = store.with_secure_cookies(true);
        assert!(session_cookie(&secure, id).ends_with("; Secure"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
