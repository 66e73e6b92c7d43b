//! Signed-subspace key material and its URI encoding.
//!
//! An SSK is addressed by two URIs sharing one crypto key:
//!
//! ```text
//! insert:  SSK@<signing key>,<crypto key>,<insert extra>/<document name>
//! request: SSK@<routing key>,<crypto key>,<request extra>/<document name>
//! ```
//!
//! The routing key is the SHA-256 of the Ed25519 verifying key, so anyone
//! holding the insert URI can compute the request URI but not the reverse.
//! All binary components use the network's base64 alphabet (`~` and `-` in
//! place of `+` and `/`, no padding) so URIs survive URL paths unescaped.

use base64::alphabet::Alphabet;
use base64::engine::general_purpose::{GeneralPurpose, NO_PAD};
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::KeyError;

const NETWORK_ALPHABET: Alphabet =
    match Alphabet::new("ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789~-") {
        Ok(alphabet) => alphabet,
        Err(_) => panic!("network base64 alphabet is invalid"),
    };

/// Base64 engine used for every binary URI component.
pub const NETWORK_BASE64: GeneralPurpose = GeneralPurpose::new(&NETWORK_ALPHABET, NO_PAD);

/// Extra bytes carried by insert URIs: version 1, insert flag, AES/PCFB, SHA-256.
pub const INSERT_EXTRA: [u8; 5] = [1, 1, 2, 0, 1];

/// Extra bytes carried by request URIs (insert flag cleared).
pub const REQUEST_EXTRA: [u8; 5] = [1, 0, 2, 0, 1];

/// An SSK whose holder may insert content under it.
#[derive(Clone)]
pub struct InsertableSsk {
    signing_key: SigningKey,
    crypto_key: [u8; 32],
    doc_name: String,
}

impl InsertableSsk {
    /// Draw a fresh key pair and crypto key from `rng`.
    ///
    /// The document name only becomes the path of the URIs; it does not feed
    /// the key material. Two sources in the same state therefore produce the
    /// same keys.
    pub fn create_random<R: RngCore + ?Sized>(rng: &mut R, doc_name: &str) -> Self {
        let mut secret = [0u8; 32];
        rng.fill_bytes(&mut secret);
        let mut crypto_key = [0u8; 32];
        rng.fill_bytes(&mut crypto_key);

        let signing_key = SigningKey::from_bytes(&secret);
        secret.fill(0);

        Self {
            signing_key,
            crypto_key,
            doc_name: doc_name.to_string(),
        }
    }

    /// Document name appended to both URIs.
    pub fn doc_name(&self) -> &str {
        &self.doc_name
    }

    /// SHA-256 of the verifying key.
    pub fn routing_key(&self) -> [u8; 32] {
        routing_key_of(&self.signing_key)
    }

    /// URI used to insert content under this key.
    pub fn insert_uri(&self) -> String {
        format_uri(
            "SSK",
            &self.signing_key.to_bytes(),
            &self.crypto_key,
            &INSERT_EXTRA,
            &self.doc_name,
        )
    }

    /// URI used to fetch content inserted under this key.
    pub fn request_uri(&self) -> String {
        format_uri(
            "SSK",
            &self.routing_key(),
            &self.crypto_key,
            &REQUEST_EXTRA,
            &self.doc_name,
        )
    }
}

impl core::fmt::Debug for InsertableSsk {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Never print the signing key.
        f.debug_struct("InsertableSsk")
            .field("request_uri", &self.request_uri())
            .finish()
    }
}

/// Convert an SSK or USK insert URI into the matching request URI.
///
/// The key type tag and everything after the key components (document name,
/// USK version segments) are carried over unchanged.
pub fn request_uri_for(insert_uri: &str) -> Result<String, KeyError> {
    let (tag, rest) = insert_uri
        .split_once('@')
        .ok_or_else(|| KeyError::malformed(insert_uri))?;
    let tag = tag.to_ascii_uppercase();
    if tag != "SSK" && tag != "USK" {
        return Err(KeyError::malformed(insert_uri));
    }

    let (keys, path) = rest.split_once('/').unwrap_or((rest, ""));
    let mut parts = keys.split(',');
    let (Some(secret), Some(crypto), Some(extra), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(KeyError::malformed(insert_uri));
    };

    let secret: [u8; 32] = decode_fixed(secret, "private key")?;
    let crypto_key: [u8; 32] = decode_fixed(crypto, "crypto key")?;
    let extra: [u8; 5] = decode_fixed(extra, "extra")?;
    if extra != INSERT_EXTRA {
        return Err(KeyError::InvalidComponent { component: "extra" });
    }

    let signing_key = SigningKey::from_bytes(&secret);
    Ok(format_uri(
        &tag,
        &routing_key_of(&signing_key),
        &crypto_key,
        &REQUEST_EXTRA,
        path,
    ))
}

fn routing_key_of(signing_key: &SigningKey) -> [u8; 32] {
    Sha256::digest(signing_key.verifying_key().as_bytes()).into()
}

fn format_uri(tag: &str, key: &[u8], crypto_key: &[u8], extra: &[u8], path: &str) -> String {
    format!(
        "{}@{},{},{}/{}",
        tag,
        NETWORK_BASE64.encode(key),
        NETWORK_BASE64.encode(crypto_key),
        NETWORK_BASE64.encode(extra),
        path
    )
}

fn decode_fixed<const N: usize>(
    encoded: &str,
    component: &'static str,
) -> Result<[u8; N], KeyError> {
    let bytes = NETWORK_BASE64
        .decode(encoded)
        .map_err(|_| KeyError::InvalidComponent { component })?;
    bytes
        .try_into()
        .map_err(|_| KeyError::InvalidComponent { component })
}
