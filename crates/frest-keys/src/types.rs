//! Key type selector and the derived URI pair.

use core::fmt;
use core::str::FromStr;

use serde::Serialize;

use crate::error::KeyError;

/// Key formats that can be generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum KeyType {
    /// Signed subspace key
    Ssk,
    /// Updatable subspace key (SSK plus an explicit version)
    Usk,
}

impl KeyType {
    /// URI tag, e.g. `SSK`.
    pub fn tag(&self) -> &'static str {
        match self {
            KeyType::Ssk => "SSK",
            KeyType::Usk => "USK",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    /// Case-insensitive; anything but SSK or USK is unsupported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("SSK") {
            Ok(KeyType::Ssk)
        } else if s.eq_ignore_ascii_case("USK") {
            Ok(KeyType::Usk)
        } else {
            Err(KeyError::UnsupportedKeyType(s.to_string()))
        }
    }
}

/// An insert/request URI pair.
///
/// Serializes to `{"insertURI": ..., "requestURI": ...}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DerivedKeyPair {
    /// Format of both URIs
    #[serde(skip)]
    pub key_type: KeyType,
    /// URI used to insert content
    #[serde(rename = "insertURI")]
    pub insert_uri: String,
    /// URI used to fetch content
    #[serde(rename = "requestURI")]
    pub request_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_parse_is_case_insensitive() {
        assert_eq!("ssk".parse::<KeyType>(), Ok(KeyType::Ssk));
        assert_eq!("SSK".parse::<KeyType>(), Ok(KeyType::Ssk));
        assert_eq!("uSk".parse::<KeyType>(), Ok(KeyType::Usk));
    }

    #[test]
    fn test_key_type_parse_rejects_others() {
        assert_eq!(
            "chk".parse::<KeyType>(),
            Err(KeyError::UnsupportedKeyType("chk".into()))
        );
        assert!("".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_pair_json_field_names() {
        let pair = DerivedKeyPair {
            key_type: KeyType::Ssk,
            insert_uri: "SSK@a,b,AQECAAE/".into(),
            request_uri: "SSK@c,b,AQACAAE/".into(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["insertURI"], "SSK@a,b,AQECAAE/");
        assert_eq!(json["requestURI"], "SSK@c,b,AQACAAE/");
        assert!(json.get("key_type").is_none());
    }
}
