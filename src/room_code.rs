//! Room code generation and parsing
//!
//! Room ids shared between clients are short lowercase-alphanumeric codes,
//! carried in a URL fragment. Knowledge of the code is the only membership
//! requirement.

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const CODE_LEN: usize = 6;

/// Generates a fresh 6-character room code.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Extracts a room code from a URL fragment, if it holds a valid one;
/// callers fall back to [`generate`] otherwise.
pub fn from_fragment(fragment: &str) -> Option<String> {
    let code = fragment.trim_start_matches('#').trim();
    if !code.is_empty() && code.bytes().all(|b| ALPHABET.contains(&b)) {
        Some(code.to_string())
    } else {
        None
    }
}
