//! Migration checksums
//!
//! SHA-256 over the migration SQL, stored when the migration is applied and
//! compared on every later connect.

use sha2::{Digest, Sha256};

pub fn compute_checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}
