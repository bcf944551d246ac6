//! Unguessable token generation for client credentials.

use base64::prelude::*;
use rand::RngCore;

/// Number of random bytes behind every generated token
pub const TOKEN_BYTES: usize = 32;

/// Generate a secure random token.
///
/// The value is 32 bytes from the thread-local CSPRNG encoded as unpadded
/// URL-safe base64, so it can appear in query strings and headers unescaped.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
