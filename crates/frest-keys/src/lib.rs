//! Key derivation for the frest gateway
//!
//! Generates SSK and USK insert/request URI pairs for the storage network:
//!
//! - **Crypto**: Ed25519 signing keys, routing keys and URI encoding
//! - **Types**: [`KeyType`] selector and [`DerivedKeyPair`]
//! - **Derive**: name/version rules and the shared [`KeyDeriver`]
//!
//! # Determinism
//!
//! Key material comes only from the randomness source handed in. The name
//! and version decide the document path, never the keys, so the same source
//! state with the same inputs yields byte-identical URIs. A deriver built
//! with [`KeyDeriver::from_entropy`] is not reproducible.
//!
//! # Example
//!
//! ```
//! use frest_keys::KeyDeriver;
//!
//! let keys = KeyDeriver::seeded(7);
//! let pair = keys.derive_usk("hello.txt", Some(3));
//! assert!(pair.insert_uri.ends_with("/hello.txt/3"));
//! ```

pub mod crypto;
pub mod derive;
pub mod error;
pub mod types;

pub use crypto::{request_uri_for, InsertableSsk, NETWORK_BASE64};
pub use derive::{derive, derive_ssk, derive_usk, KeyDeriver};
pub use error::KeyError;
pub use types::{DerivedKeyPair, KeyType};
