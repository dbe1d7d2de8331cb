//! Request authentication.
//!
//! Dual-token system: short-lived stateless access tokens and
//! database-tracked refresh tokens. Protected handlers take the [`Auth`]
//! extractor, which resolves the caller from the Authorization header or
//! the access token cookie and rejects with 401 otherwise.

mod cookie;
mod errors;
mod extractors;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, bearer_token, clear_cookie, get_cookie,
    session_cookie,
};
pub use errors::AuthRejection;
pub use extractors::{Auth, AuthenticatedUser};
pub use state::HasAuthBackend;
