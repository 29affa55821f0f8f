//! Content identity tokens.
//!
//! Every served tile carries a 13-character base-32 identity tag
//! (alphabet `0-9a-v`), used for conditional-response matching and for
//! telling real tiles apart from the sentinel missing tile. Generated tags
//! come from a 64-bit truncation of a SHA-256 content digest; tags arriving
//! from elsewhere (origin ETags, `If-None-Match` values, configured
//! sentinels) are normalized to the same fixed width before comparison.

use sha2::{Digest, Sha256};

/// Exact width of an identity token.
pub const IDENTITY_LEN: usize = 13;

const ALPHABET: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

fn is_token_char(c: char) -> bool {
    c.is_ascii_digit() || ('a'..='v').contains(&c) || ('A'..='V').contains(&c)
}

/// A fixed-width tile identity.
///
/// Comparison is plain string equality, which is only meaningful between
/// tokens produced by [`from_content`](IdentityTag::from_content) /
/// [`normalize`](IdentityTag::normalize), both of which guarantee the
/// 13-character invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityTag(String);

impl IdentityTag {
    /// Derive the identity of an encoded payload.
    ///
    /// Deterministic: the same bytes always produce the same token.
    pub fn from_content(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        Self::from_u64(u64::from_le_bytes(word))
    }

    /// Encode a 64-bit value as a token, most significant digit first.
    pub fn from_u64(mut value: u64) -> Self {
        let mut buf = [0u8; IDENTITY_LEN];
        for slot in buf.iter_mut().rev() {
            *slot = ALPHABET[(value & 31) as usize];
            value >>= 5;
        }
        // buf is ASCII by construction
        Self(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Normalize a foreign tag to token width.
    ///
    /// Strips every character outside the token alphabet (quotes, weak
    /// validators, separators), then truncates or zero-pads to exactly 13
    /// characters.
    pub fn normalize(raw: &str) -> Self {
        let mut token: String = raw.chars().filter(|c| is_token_char(*c)).collect();
        token.truncate(IDENTITY_LEN);
        while token.len() < IDENTITY_LEN {
            token.push('0');
        }
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_width_and_alphabet() {
        for value in [0u64, 1, 31, 32, u64::MAX, 0xDEAD_BEEF_CAFE_F00D] {
            let tag = IdentityTag::from_u64(value);
            assert_eq!(tag.as_str().len(), IDENTITY_LEN);
            assert!(tag
                .as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='v').contains(&c)));
        }
    }

    #[test]
    fn test_from_u64_values() {
        assert_eq!(IdentityTag::from_u64(0).as_str(), "0000000000000");
        assert_eq!(IdentityTag::from_u64(1).as_str(), "0000000000001");
        assert_eq!(IdentityTag::from_u64(31).as_str(), "000000000000v");
        assert_eq!(IdentityTag::from_u64(32).as_str(), "0000000000010");
    }

    #[test]
    fn test_from_content_deterministic() {
        let a = IdentityTag::from_content(b"tile payload");
        let b = IdentityTag::from_content(b"tile payload");
        assert_eq!(a, b);
        let c = IdentityTag::from_content(b"tile payloae");
        assert_ne!(a, c);
    }

    #[test]
    fn test_normalize_strips_and_pads() {
        assert_eq!(IdentityTag::normalize("\"abc\"").as_str(), "abc0000000000");
        assert_eq!(IdentityTag::normalize("").as_str(), "0000000000000");
        // 'w'..'z' are outside the alphabet
        assert_eq!(IdentityTag::normalize("wxyz123").as_str(), "1230000000000");
    }

    #[test]
    fn test_normalize_truncates() {
        let raw = "0123456789abcdefg"; // 17 valid characters
        assert_eq!(IdentityTag::normalize(raw).as_str(), "0123456789abc");
        assert_eq!(IdentityTag::normalize(raw).as_str().len(), IDENTITY_LEN);
    }

    #[test]
    fn test_normalize_keeps_upper_half_alphabet() {
        // Uppercase A-V are retained as sent
        assert_eq!(IdentityTag::normalize("\"AbC\"").as_str(), "AbC0000000000");
    }

    #[test]
    fn test_normalize_is_idempotent_on_generated_tokens() {
        let tag = IdentityTag::from_content(b"some tile");
        assert_eq!(IdentityTag::normalize(tag.as_str()), tag);
    }
}
