/// Team invitation tokens
///
/// Format: `inv_` followed by 40 base62 characters. The plaintext goes back
/// to the inviter once; the database keeps only the SHA-256 hex digest, so a
/// leaked table cannot be replayed as invites.
///
/// # Example
///
/// ```
/// use planboard_shared::auth::invite_token::{generate_invite_token, hash_invite_token};
///
/// let (token, hash) = generate_invite_token();
/// assert!(token.starts_with("inv_"));
/// assert_eq!(hash, hash_invite_token(&token));
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

const TOKEN_PREFIX: &str = "inv_";
const TOKEN_RANDOM_LENGTH: usize = 40;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Total length of a well-formed token
pub const INVITE_TOKEN_LENGTH: usize = TOKEN_PREFIX.len() + TOKEN_RANDOM_LENGTH;

/// Returns `(plaintext, sha256_hex)`
pub fn generate_invite_token() -> (String, String) {
    let mut rng = rand::thread_rng();
    let random_part: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{}{}", TOKEN_PREFIX, random_part);
    let hash = hash_invite_token(&token);
    (token, hash)
}

pub fn hash_invite_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cheap shape check done before touching the database
pub fn validate_invite_token_format(token: &str) -> bool {
    token.len() == INVITE_TOKEN_LENGTH
        && token
            .strip_prefix(TOKEN_PREFIX)
            .is_some_and(|rest| rest.bytes().all(|b| b.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_invite_token() {
        let (token, hash) = generate_invite_token();

        assert!(token.starts_with("inv_"));
        assert_eq!(token.len(), INVITE_TOKEN_LENGTH);
        assert_eq!(hash.len(), 64);
        assert!(validate_invite_token_format(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_invite_token();
        let (b, _) = generate_invite_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let token = format!("inv_{}", "a".repeat(40));
        assert_eq!(hash_invite_token(&token), hash_invite_token(&token));
        assert_ne!(hash_invite_token(&token), hash_invite_token("inv_other"));
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_invite_token_format(&format!("inv_{}", "Ab9".repeat(13) + "x")));
        assert!(!validate_invite_token_format(&format!("key_{}", "a".repeat(40))));
        assert!(!validate_invite_token_format(&format!("inv_{}", "a".repeat(39))));
        assert!(!validate_invite_token_format(&format!("inv_{}-", "a".repeat(39))));
        assert!(!validate_invite_token_format(""));
    }
}
