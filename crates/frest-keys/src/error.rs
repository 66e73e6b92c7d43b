//! Error types for key derivation.

use thiserror::Error;

/// Errors from key parsing and derivation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Key type other than SSK or USK requested
    #[error("Requested keytype is not supported: {0}")]
    UnsupportedKeyType(String),

    /// URI does not have the `XSK@key,crypto,extra/path` shape
    #[error("malformed key URI: {0}")]
    MalformedUri(String),

    /// A key component did not decode to the expected length
    #[error("invalid {component} in key URI")]
    InvalidComponent {
        /// Which component failed (`private key`, `crypto key`, `extra`)
        component: &'static str,
    },
}

impl KeyError {
    /// Create a malformed URI error.
    pub fn malformed(uri: impl Into<String>) -> Self {
        Self::MalformedUri(uri.into())
    }
}
