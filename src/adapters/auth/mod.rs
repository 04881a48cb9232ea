//! Password hashing adapters.
//!
//! - `Argon2PasswordHasher` - Argon2id PHC strings, hashed off the executor

mod argon2_hasher;

pub use argon2_hasher::Argon2PasswordHasher;
