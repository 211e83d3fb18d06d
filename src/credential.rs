//! Salted password hashes, stored as `<salt hex>$<sha256 hex>`.

use rand::Rng;
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    format!("{}${}", hex::encode(salt), digest(&salt, password))
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once('$') else {
        return false;
    };
    match hex::decode(salt) {
        Ok(salt) if salt.len() == SALT_LEN => digest(&salt, password) == expected,
        _ => false,
    }
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
