//! Request extractors.

pub mod session;

pub use session::{expired_session_cookie, session_cookie, session_id_from_headers, SessionCookie, SESSION_COOKIE};
