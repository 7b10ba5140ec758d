//! Secret generation and placeholder detection.
//!
//! Pure functions: no files touched, no ambient environment read.

use std::fmt::Write as _;

use rand::rngs::OsRng;
use rand::RngCore;

/// Values starting with this marker are treated as unset.
pub const PLACEHOLDER_PREFIX: &str = "CHANGE_THIS";

/// Well-known insecure defaults shipped by upstream images.
pub const INSECURE_DEFAULTS: &[&str] = &["redis_password", "minioadmin"];

/// Minimum secret size: 32 bytes = 256 bits of entropy.
const MIN_SECRET_BYTES: usize = 32;

/// Generate a random hex secret with at least 256 bits of entropy.
///
/// The OS generator is the primary source; if it is unavailable the thread
/// RNG (also a CSPRNG, reseeded from the OS) is used instead. There is no
/// non-cryptographic fallback.
pub fn generate_secret(length_bytes: usize) -> String {
    let mut buf = vec![0u8; length_bytes.max(MIN_SECRET_BYTES)];
    if OsRng.try_fill_bytes(&mut buf).is_err() {
        rand::thread_rng().fill_bytes(&mut buf);
    }

    let mut out = String::with_capacity(buf.len() * 2);
    for byte in &buf {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Whether a configured value still needs to be generated.
///
/// True for empty values, values carrying the `CHANGE_THIS` marker, and
/// well-known insecure defaults.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty()
        || value.starts_with(PLACEHOLDER_PREFIX)
        || INSECURE_DEFAULTS.contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_is_hex_and_long_enough() {
        let secret = generate_secret(32);
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn short_requests_are_padded_to_256_bits() {
        assert_eq!(generate_secret(8).len(), 64);
        assert_eq!(generate_secret(0).len(), 64);
    }

    #[test]
    fn longer_requests_are_honored() {
        assert_eq!(generate_secret(48).len(), 96);
    }

    #[test]
    fn secrets_do_not_repeat() {
        assert_ne!(generate_secret(32), generate_secret(32));
    }

    #[test]
    fn placeholder_truth_table() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("   "));
        assert!(is_placeholder("CHANGE_THIS_ANYTHING"));
        assert!(is_placeholder("CHANGE_THIS"));
        assert!(is_placeholder("redis_password"));
        assert!(is_placeholder("minioadmin"));
        assert!(!is_placeholder("s3cret"));
        assert!(!is_placeholder(&generate_secret(32)));
    }
}
