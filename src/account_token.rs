//! Stateless activation and password-reset tokens.
//!
//! Tokens are never stored: they are an HMAC over the identity state that
//! the corresponding action mutates. Activation flips `is_active`, a
//! password reset replaces the hash and bumps `last_password_change`, so a
//! used token no longer verifies. The emailed link carries the user id as
//! URL-safe base64 next to the token.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::db::User;

type HmacSha256 = Hmac<Sha256>;

/// Maximum token age: 3 days.
pub const ACCOUNT_TOKEN_MAX_AGE_SECS: u64 = 3 * 24 * 60 * 60;

/// What the token authorizes. Feeds the MAC so activation and reset tokens
/// are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

/// Derive a token for the given user and purpose at timestamp `now`.
/// Format: `{timestamp_base36}-{hex_mac}`.
pub fn make_token(user: &User, purpose: TokenPurpose, secret: &[u8], now: u64) -> String {
    let ts = to_base36(now);
    format!("{}-{}", ts, compute_mac(user, purpose, secret, &ts))
}

/// Verify a token previously produced by [`make_token`].
/// Fails on bad shape, wrong MAC (any identity field changed since
/// derivation), or a timestamp older than [`ACCOUNT_TOKEN_MAX_AGE_SECS`].
pub fn check_token(
    user: &User,
    purpose: TokenPurpose,
    secret: &[u8],
    token: &str,
    now: u64,
) -> bool {
    let Some((ts, mac_hex)) = token.split_once('-') else {
        return false;
    };
    let Some(issued_at) = from_base36(ts) else {
        return false;
    };
    if issued_at > now || now - issued_at > ACCOUNT_TOKEN_MAX_AGE_SECS {
        return false;
    }
    let Ok(mac_bytes) = hex::decode(mac_hex) else {
        return false;
    };

    // verify_slice is constant-time over the MAC bytes
    mac_for(user, purpose, secret, ts)
        .verify_slice(&mac_bytes)
        .is_ok()
}

/// Encode a user id for use in activation/reset URLs.
pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

/// Decode a uid path segment back into a user id.
pub fn decode_uid(uid: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uid).ok()?;
    let s = std::str::from_utf8(&bytes).ok()?;
    s.parse().ok()
}

fn mac_for(user: &User, purpose: TokenPurpose, secret: &[u8], ts: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    for field in [
        purpose.as_str(),
        &user.id.to_string(),
        &user.email,
        &user.password_hash,
        &user.last_password_change.to_string(),
        if user.is_active { "1" } else { "0" },
        ts,
    ] {
        mac.update(field.as_bytes());
        mac.update(b"\x00");
    }
    mac
}

fn compute_mac(user: &User, purpose: TokenPurpose, secret: &[u8], ts: &str) -> String {
    hex::encode(mac_for(user, purpose, secret, ts).finalize().into_bytes())
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}
