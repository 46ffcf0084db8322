//! Password digest helper. Plain `sha256` over the raw password, no salt.
//! A placeholder, not a security contract.

use sha2::{Digest, Sha256};

pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_hex_encoded() {
        let a = digest_password("hunter2");
        let b = digest_password("hunter2");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_passwords_digest_differently() {
        assert_ne!(digest_password("a"), digest_password("b"));
    }
}
