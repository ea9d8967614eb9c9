use rand::Rng;
use sha2::{Digest, Sha256};

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const GROUPS: usize = 3;
const GROUP_LEN: usize = 4;

/// A key such as `RSE-K7QM-2HXD-9WTP`. Only its hash is stored.
pub(crate) fn generate_secret_key() -> String {
    let mut rng = rand::thread_rng();
    let groups: Vec<String> = (0..GROUPS)
        .map(|_| {
            (0..GROUP_LEN).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
        })
        .collect();
    format!("RSE-{}", groups.join("-"))
}

/// Keys are compared case-insensitively and ignore surrounding whitespace.
pub(crate) fn normalize_secret_key(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub(crate) fn hash_secret_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_secret_key(key).as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_use_prefix_and_groups() {
        let key = generate_secret_key();
        let parts: Vec<&str> = key.split('-').collect();

        assert_eq!(parts[0], "RSE");
        assert_eq!(parts.len(), GROUPS + 1);
        assert!(parts[1..].iter().all(|group| group.len() == GROUP_LEN
            && group.bytes().all(|byte| ALPHABET.contains(&byte))));
    }

    #[test]
    fn hash_ignores_case_and_whitespace() {
        let key = "RSE-ABCD-EFGH-JKLM";
        assert_eq!(hash_secret_key(key), hash_secret_key("  rse-abcd-efgh-jklm \n"));
        assert_eq!(hash_secret_key(key).len(), 64);
        assert_ne!(hash_secret_key(key), hash_secret_key("RSE-ABCD-EFGH-JKLN"));
    }
}
