pub mod session;
pub mod token;

use sha2::{Digest, Sha256};

pub use session::{MemorySessionStore, RedisSessionStore, SessionError, SessionStore};
pub use token::{Claims, TokenCodec, TokenError, TokenKind};

/// Hex SHA-256 digest. Passwords are stored and compared in this form only.
pub fn hash_password(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}
