//! Cryptographic services for the CareHub runtime
//!
//! [`CryptoService`] owns the process key material:
//!
//! - a 256-bit symmetric key for AES-256-GCM (`iv:ciphertext:tag`, hex) and
//!   HMAC-SHA256
//! - an optional RSA key pair for OAEP-SHA256, persisted as PEM files
//!
//! Password hashing uses Argon2id; hashes written by the previous PBKDF2
//! scheme are still verified.
//!
//! # Example
//!
//! ```rust
//! use crypto::CryptoService;
//!
//! let crypto = CryptoService::symmetric_only([7u8; 32])?;
//! let sealed = crypto.encrypt("room 12B")?;
//! assert_eq!(crypto.decrypt(&sealed)?, "room 12B");
//!
//! let mac = crypto.generate_hmac("patient:42");
//! assert!(crypto.verify_hmac("patient:42", &mac));
//! # Ok::<(), crypto::CryptoError>(())
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing))]

pub mod config;
pub mod constant_time;
pub mod error;
pub mod kdf;
pub mod rsa_keys;
pub mod service;
pub mod symmetric;

pub use config::CryptoConfig;
pub use error::*;
pub use rsa_keys::RsaKeyPair;
pub use service::*;
