//! Name/version driven key pair derivation.
//!
//! # Rules
//!
//! | Key | Name | Version | Document name | Suffix (insert / request) |
//! |-----|------|---------|---------------|---------------------------|
//! | SSK | ""   | any     | ""            | -                         |
//! | SSK | n    | none    | n             | -                         |
//! | SSK | n    | v       | n-v           | -                         |
//! | USK | ""   | any     | ""            | -                         |
//! | USK | n    | none    | n             | `/0` / `/-1`              |
//! | USK | n    | v       | n             | `/v` / `/v`               |
//!
//! A USK without a version means "the next edition to insert is 0, the
//! latest known edition is unresolved".

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::crypto::InsertableSsk;
use crate::types::{DerivedKeyPair, KeyType};

/// Derive an SSK pair from `rng`.
pub fn derive_ssk<R: RngCore + ?Sized>(
    rng: &mut R,
    name: &str,
    version: Option<u32>,
) -> DerivedKeyPair {
    let doc_name = match version {
        Some(version) if !name.is_empty() => format!("{}-{}", name, version),
        _ => name.to_string(),
    };
    let key = InsertableSsk::create_random(rng, &doc_name);
    DerivedKeyPair {
        key_type: KeyType::Ssk,
        insert_uri: key.insert_uri(),
        request_uri: key.request_uri(),
    }
}

/// Derive a USK pair from `rng`.
///
/// The underlying SSK is derived from the bare name; the version only ever
/// shows up as a trailing path segment.
pub fn derive_usk<R: RngCore + ?Sized>(
    rng: &mut R,
    name: &str,
    version: Option<u32>,
) -> DerivedKeyPair {
    let ssk = derive_ssk(rng, name, None);
    let mut insert_uri = retag_usk(&ssk.insert_uri);
    let mut request_uri = retag_usk(&ssk.request_uri);

    if !name.is_empty() {
        match version {
            Some(version) => {
                insert_uri.push_str(&format!("/{}", version));
                request_uri.push_str(&format!("/{}", version));
            }
            None => {
                insert_uri.push_str("/0");
                request_uri.push_str("/-1");
            }
        }
    }

    DerivedKeyPair {
        key_type: KeyType::Usk,
        insert_uri,
        request_uri,
    }
}

/// Derive a pair of the given type from `rng`.
pub fn derive<R: RngCore + ?Sized>(
    rng: &mut R,
    key_type: KeyType,
    name: &str,
    version: Option<u32>,
) -> DerivedKeyPair {
    match key_type {
        KeyType::Ssk => derive_ssk(rng, name, version),
        KeyType::Usk => derive_usk(rng, name, version),
    }
}

// Only the leading tag is rewritten; base64 key material may itself contain
// the letters "SSK".
fn retag_usk(ssk_uri: &str) -> String {
    match ssk_uri.strip_prefix("SSK@") {
        Some(rest) => format!("USK@{}", rest),
        None => ssk_uri.to_string(),
    }
}

/// Shared key generator backed by one randomness source.
///
/// Handlers run concurrently, so the source sits behind a mutex; derivation
/// itself is cheap and never blocks on I/O.
pub struct KeyDeriver {
    rng: Mutex<StdRng>,
}

impl KeyDeriver {
    /// Generator seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible generator, for tests and fixtures.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Generator over an existing source.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Derive an SSK pair.
    pub fn derive_ssk(&self, name: &str, version: Option<u32>) -> DerivedKeyPair {
        self.derive(KeyType::Ssk, name, version)
    }

    /// Derive a USK pair.
    pub fn derive_usk(&self, name: &str, version: Option<u32>) -> DerivedKeyPair {
        self.derive(KeyType::Usk, name, version)
    }

    /// Derive a pair of the given type.
    pub fn derive(&self, key_type: KeyType, name: &str, version: Option<u32>) -> DerivedKeyPair {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        derive(&mut *rng, key_type, name, version)
    }
}

impl core::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyDeriver").finish_non_exhaustive()
    }
}
