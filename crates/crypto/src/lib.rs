//! Credential hashing for stash admin keys.
//!
//! Hashed keys are stored as `argon2id$<base64 derived key>`. Every hash is
//! derived with the same application salt and cost parameters, so checking
//! a presented key means re-deriving it and comparing the two derived byte
//! strings in constant time.
//!
//! Per-object delete and access keys are bearer tokens kept in the clear;
//! they never pass through this crate.

mod auth_file;

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

pub use auth_file::AuthKeys;

/// Algorithm tag preceding the `$` in a stored hash.
pub const HASH_TAG: &str = "argon2id";

/// Derived key length in bytes.
pub const KEY_LEN: usize = 32;

const SALT: &[u8] = b"stash-server";
const M_COST_KIB: u32 = 19 * 1024;
const T_COST: u32 = 2;
const P_COST: u32 = 1;

/// Errors that can occur while hashing or verifying credentials.
#[derive(Debug, Error)]
pub enum KeyHashError {
    /// The stored value is not a `argon2id$<base64>` record.
    #[error("unrecognized hash format")]
    InvalidFormat,

    /// The base64 part of a stored hash does not decode.
    #[error("invalid base64 in hash: {0}")]
    InvalidEncoding(String),

    /// Argon2 rejected its inputs.
    #[error("key derivation failed: {0}")]
    Derivation(String),

    /// The auth file could not be read.
    #[error("failed to read auth file {path}: {source}")]
    AuthFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A line of the auth file is not a valid hash.
    #[error("auth file line {line} is not a valid key hash")]
    InvalidAuthEntry { line: usize },
}

fn derive(plaintext: &str) -> Result<Zeroizing<[u8; KEY_LEN]>, KeyHashError> {
    let params = Params::new(M_COST_KIB, T_COST, P_COST, Some(KEY_LEN))
        .map_err(|e| KeyHashError::Derivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(plaintext.as_bytes(), SALT, &mut out[..])
        .map_err(|e| KeyHashError::Derivation(e.to_string()))?;
    Ok(out)
}

fn decode(stored: &str) -> Result<Zeroizing<Vec<u8>>, KeyHashError> {
    let encoded = stored
        .trim()
        .strip_prefix(HASH_TAG)
        .and_then(|rest| rest.strip_prefix('$'))
        .ok_or(KeyHashError::InvalidFormat)?;
    let bytes = B64
        .decode(encoded)
        .map_err(|e| KeyHashError::InvalidEncoding(e.to_string()))?;
    if bytes.len() != KEY_LEN {
        return Err(KeyHashError::InvalidFormat);
    }
    Ok(Zeroizing::new(bytes))
}

/// Hash a plaintext key into its stored form.
pub fn hash_key(plaintext: &str) -> Result<String, KeyHashError> {
    let derived = derive(plaintext)?;
    Ok(format!("{HASH_TAG}${}", B64.encode(&derived[..])))
}

/// Returns `true` if `value` is a well-formed stored hash.
#[must_use]
pub fn is_valid_hash(value: &str) -> bool {
    decode(value).is_ok()
}

/// Check `presented` against one stored hash.
pub fn check(stored: &str, presented: &str) -> Result<bool, KeyHashError> {
    let expected = decode(stored)?;
    let derived = derive(presented)?;
    Ok(bool::from(derived[..].ct_eq(&expected[..])))
}

/// Check `presented` against every stored hash, succeeding on the first
/// match. The key is derived once and each comparison is constant-time. A
/// malformed entry fails the whole check.
pub fn check_list<S: AsRef<str>>(stored: &[S], presented: &str) -> Result<bool, KeyHashError> {
    let derived = derive(presented)?;
    for entry in stored {
        let expected = decode(entry.as_ref())?;
        if bool::from(derived[..].ct_eq(&expected[..])) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Check a credential that may or may not be hashed.
///
/// Tagged values go through [`check`], PHC strings (`$argon2id$v=19$...`)
/// through the argon2 verifier, anything else is compared as plaintext.
pub fn check_with_fallback(stored: &str, presented: &str) -> Result<bool, KeyHashError> {
    if stored
        .strip_prefix(HASH_TAG)
        .is_some_and(|rest| rest.starts_with('$'))
    {
        return check(stored, presented);
    }
    if stored.starts_with("$argon2") {
        let parsed = PasswordHash::new(stored).map_err(|_| KeyHashError::InvalidFormat)?;
        return Ok(Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok());
    }
    Ok(stored == presented)
}

#[cfg(test)]
mod tests {
    use argon2::password_hash::{PasswordHasher, SaltString};

    use super::*;

    #[test]
    fn hash_then_check() {
        let hash = hash_key("secret").unwrap();
        assert!(hash.starts_with("argon2id$"));
        assert!(is_valid_hash(&hash));
        assert!(check(&hash, "secret").unwrap());
        assert!(!check(&hash, "wrong").unwrap());
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_key("same").unwrap(), hash_key("same").unwrap());
        assert_ne!(hash_key("one").unwrap(), hash_key("two").unwrap());
    }

    #[test]
    fn rejects_malformed_hashes() {
        let short = format!("{HASH_TAG}${}", B64.encode([1u8; 8]));
        let other_tag = format!("scrypt${}", B64.encode([1u8; KEY_LEN]));
        for bad in ["", "argon2id", "argon2id$", "argon2id$!!!", "plain", short.as_str(), other_tag.as_str()] {
            assert!(!is_valid_hash(bad), "{bad:?} should be invalid");
        }
        assert!(matches!(
            check("argon2id$@@@", "x"),
            Err(KeyHashError::InvalidEncoding(_))
        ));
        assert!(matches!(check("nope", "x"), Err(KeyHashError::InvalidFormat)));
    }

    #[test]
    fn check_list_matches_any_entry() {
        let hashes = vec![hash_key("alpha").unwrap(), hash_key("beta").unwrap()];
        assert!(check_list(&hashes, "beta").unwrap());
        assert!(!check_list(&hashes, "gamma").unwrap());
        assert!(!check_list::<String>(&[], "alpha").unwrap());
    }

    #[test]
    fn check_list_fails_on_malformed_entry() {
        let hashes = vec!["argon2id$***".to_owned(), hash_key("alpha").unwrap()];
        assert!(check_list(&hashes, "alpha").is_err());
    }

    #[test]
    fn fallback_handles_every_form() {
        let tagged = hash_key("k1").unwrap();
        assert!(check_with_fallback(&tagged, "k1").unwrap());
        assert!(!check_with_fallback(&tagged, "k2").unwrap());

        let salt = SaltString::from_b64("c3Rhc2hzYWx0MTIz").unwrap();
        let phc = Argon2::default()
            .hash_password(b"k1", &salt)
            .unwrap()
            .to_string();
        assert!(check_with_fallback(&phc, "k1").unwrap());
        assert!(!check_with_fallback(&phc, "k2").unwrap());

        assert!(check_with_fallback("plain-key", "plain-key").unwrap());
        assert!(!check_with_fallback("plain-key", "other").unwrap());
    }
}
