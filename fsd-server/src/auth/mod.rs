//! Client authentication: the obfuscated challenge/response chain spoken by
//! the approved pilot/ATC clients, bearer token verification, and the user
//! directory behind password logins.

pub mod companion;
pub mod directory;
pub mod jwt;

pub use companion::AuthCompanion;
pub use directory::{MemoryDirectory, UserDirectory, UserRecord};

/// Initial challenge sent in `$DI`, 16 hex chars.
pub fn generate_initial_challenge() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// Counter-challenge for in-session `$ZC` rounds, 8 hex chars.
pub fn generate_challenge() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}
