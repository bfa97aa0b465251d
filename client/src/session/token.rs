use rand::RngCore;
use rand::rngs::OsRng;

/// Token length in hex characters (128 bits).
pub const TOKEN_LENGTH: usize = 32;

/// How long a freshly generated token stays valid.
pub const TOKEN_EXPIRY_DAYS: i64 = 7;

/// Generate a random bearer token (32 lowercase hex characters). Fails only
/// when the OS randomness source is unavailable.
pub fn generate_token_value() -> Result<String, rand::Error> {
    let mut bytes = [0u8; TOKEN_LENGTH / 2];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(hex_encode(&bytes))
}

/// Check the shape of a candidate token: exactly 32 lowercase hex characters.
pub fn is_valid_token_format(candidate: &str) -> bool {
    candidate.len() == TOKEN_LENGTH
        && candidate
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
