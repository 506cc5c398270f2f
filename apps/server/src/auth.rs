use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Message signed with the passphrase to form the admin session token.
const SESSION_LABEL: &[u8] = b"barbershop-admin-session";

/// Compare a login attempt against the shared passphrase (exact match).
pub fn check_passphrase(attempt: &str, passphrase: &str) -> bool {
    !passphrase.is_empty() && attempt == passphrase
}

fn session_mac(passphrase: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(passphrase.as_bytes()).expect("HMAC can take key of any size");
    mac.update(SESSION_LABEL);
    mac
}

/// Token handed out after a successful login. It never expires and only
/// says "this client knew the passphrase".
pub fn session_token(passphrase: &str) -> String {
    hex::encode(session_mac(passphrase).finalize().into_bytes())
}

/// Validate a token against the current passphrase.
pub fn verify_session_token(token: &str, passphrase: &str) -> bool {
    let Ok(raw) = hex::decode(token) else {
        return false;
    };
    session_mac(passphrase).verify_slice(&raw).is_ok()
}

/// Extract and validate the admin token from an Authorization header.
/// Header format: `Bearer <token>`
pub fn is_admin_header(auth_header: &str, passphrase: &str) -> bool {
    auth_header
        .strip_prefix("Bearer ")
        .is_some_and(|token| verify_session_token(token.trim(), passphrase))
}
