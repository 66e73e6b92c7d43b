//! Storage network request types.

use core::fmt;
use core::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

// =============================================================================
// Priority
// =============================================================================

/// Scheduling class of a request. Lower is more urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(u8);

impl Priority {
    /// Most urgent class
    pub const MAXIMUM: Priority = Priority(0);
    /// Interactive requests (default for the gateway)
    pub const INTERACTIVE: Priority = Priority(1);
    /// Splitfiles the user is waiting for
    pub const IMMEDIATE_SPLITFILE: Priority = Priority(2);
    /// USK updates
    pub const UPDATE: Priority = Priority(3);
    /// Background splitfile transfers
    pub const BULK_SPLITFILE: Priority = Priority(4);
    /// Prefetch
    pub const PREFETCH: Priority = Priority(5);
    /// Scheduled but not running
    pub const PAUSED: Priority = Priority(6);
    /// Least urgent class
    pub const MINIMUM: Priority = Priority::PAUSED;

    /// Create from a numeric class, rejecting values outside 0..=6.
    pub fn new(class: u8) -> Result<Self, NetworkError> {
        if class > Self::MINIMUM.0 {
            return Err(NetworkError::InvalidPriority(class.to_string()));
        }
        Ok(Priority(class))
    }

    /// Parse a query parameter; blank means [`Priority::INTERACTIVE`].
    pub fn from_param(param: &str) -> Result<Self, NetworkError> {
        let param = param.trim();
        if param.is_empty() {
            return Ok(Self::default());
        }
        param.parse()
    }

    /// Numeric class.
    pub fn class(&self) -> u8 {
        self.0
    }

    /// Human-readable class name.
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "maximum",
            1 => "interactive",
            2 => "immediate-splitfile",
            3 => "update",
            4 => "bulk-splitfile",
            5 => "prefetch",
            _ => "paused",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::INTERACTIVE
    }
}

impl FromStr for Priority {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let class: u8 = s
            .trim()
            .parse()
            .map_err(|_| NetworkError::InvalidPriority(s.to_string()))?;
        Priority::new(class)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

// =============================================================================
// URIs
// =============================================================================

/// Key type tag of a network URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UriKeyType {
    /// Content hash key
    Chk,
    /// Signed subspace key
    Ssk,
    /// Updatable subspace key
    Usk,
    /// Keyword signed key
    Ksk,
}

impl UriKeyType {
    /// Canonical uppercase tag.
    pub fn tag(&self) -> &'static str {
        match self {
            UriKeyType::Chk => "CHK",
            UriKeyType::Ssk => "SSK",
            UriKeyType::Usk => "USK",
            UriKeyType::Ksk => "KSK",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        [
            UriKeyType::Chk,
            UriKeyType::Ssk,
            UriKeyType::Usk,
            UriKeyType::Ksk,
        ]
        .into_iter()
        .find(|key_type| tag.eq_ignore_ascii_case(key_type.tag()))
    }
}

/// A parsed storage network URI, `TAG@body`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkUri {
    key_type: UriKeyType,
    body: String,
}

impl NetworkUri {
    /// Parse `TAG@body`. The tag is case-insensitive and normalized.
    ///
    /// Only CHK URIs may have an empty body (the key is computed from the
    /// content on insert).
    pub fn parse(uri: &str) -> Result<Self, NetworkError> {
        let (tag, body) = uri
            .split_once('@')
            .ok_or_else(|| NetworkError::InvalidUri(uri.to_string()))?;
        let key_type =
            UriKeyType::from_tag(tag).ok_or_else(|| NetworkError::InvalidUri(uri.to_string()))?;
        if body.is_empty() && key_type != UriKeyType::Chk {
            return Err(NetworkError::InvalidUri(uri.to_string()));
        }
        Ok(Self {
            key_type,
            body: body.to_string(),
        })
    }

    /// Key type of this URI.
    pub fn key_type(&self) -> UriKeyType {
        self.key_type
    }

    /// Everything after the `@`.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Path after the key part, empty if none.
    pub fn doc_name(&self) -> &str {
        self.body.split_once('/').map(|(_, doc)| doc).unwrap_or("")
    }
}

impl FromStr for NetworkUri {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NetworkUri::parse(s)
    }
}

impl fmt::Display for NetworkUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key_type.tag(), self.body)
    }
}

// =============================================================================
// Insert
// =============================================================================

/// Content type used when the request carries none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata stored alongside inserted content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// MIME type of the content
    pub content_type: String,
}

impl ClientMetadata {
    /// Metadata with the given MIME type; blank falls back to
    /// [`DEFAULT_CONTENT_TYPE`].
    pub fn new(content_type: Option<&str>) -> Self {
        let content_type = content_type
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        Self {
            content_type: content_type.to_string(),
        }
    }
}

impl Default for ClientMetadata {
    fn default() -> Self {
        Self::new(None)
    }
}

/// One unit of content to insert.
#[derive(Clone, Debug)]
pub struct InsertBlock {
    /// Immutable content
    pub data: Bytes,
    /// Content metadata
    pub metadata: ClientMetadata,
    /// Where to insert
    pub target: NetworkUri,
}

impl InsertBlock {
    /// Create an insert block.
    pub fn new(data: Bytes, metadata: ClientMetadata, target: NetworkUri) -> Self {
        Self {
            data,
            metadata,
            target,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_default_is_interactive() {
        assert_eq!(Priority::default(), Priority::INTERACTIVE);
        assert_eq!(Priority::from_param("").unwrap(), Priority::INTERACTIVE);
        assert_eq!(Priority::from_param("  ").unwrap(), Priority::INTERACTIVE);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(Priority::from_param("4").unwrap(), Priority::BULK_SPLITFILE);
        assert_eq!(Priority::from_param("0").unwrap().name(), "maximum");
        assert!(matches!(
            Priority::from_param("7"),
            Err(NetworkError::InvalidPriority(_))
        ));
        assert!(matches!(
            Priority::from_param("high"),
            Err(NetworkError::InvalidPriority(_))
        ));
        assert!(Priority::from_param("-1").is_err());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::MAXIMUM < Priority::INTERACTIVE);
        assert_eq!(Priority::MINIMUM, Priority::PAUSED);
        assert_eq!(Priority::UPDATE.to_string(), "3 (update)");
    }

    #[test]
    fn test_uri_parse() {
        let uri = NetworkUri::parse("ksk@test/a.txt").unwrap();
        assert_eq!(uri.key_type(), UriKeyType::Ksk);
        assert_eq!(uri.to_string(), "KSK@test/a.txt");
        assert_eq!(uri.doc_name(), "a.txt");

        let uri = NetworkUri::parse("USK@k,c,e/site/3").unwrap();
        assert_eq!(uri.doc_name(), "site/3");
        assert_eq!(uri.body(), "k,c,e/site/3");

        let uri = NetworkUri::parse("CHK@").unwrap();
        assert_eq!(uri.doc_name(), "");
    }

    #[test]
    fn test_uri_parse_rejects() {
        assert!(NetworkUri::parse("no-tag").is_err());
        assert!(NetworkUri::parse("XYZ@abc").is_err());
        assert!(NetworkUri::parse("KSK@").is_err());
    }

    #[test]
    fn test_metadata_default_content_type() {
        assert_eq!(ClientMetadata::new(None).content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(ClientMetadata::new(Some(" ")).content_type, DEFAULT_CONTENT_TYPE);
        assert_eq!(
            ClientMetadata::new(Some("text/plain")).content_type,
            "text/plain"
        );
    }
}
