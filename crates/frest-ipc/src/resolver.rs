//! In-process name resolver plugin.
//!
//! Keeps a name → request key registry and answers `resolver.resolve` and
//! `resolver.register` requests. Names are case-insensitive and stored
//! lowercased. Registering the same key twice is idempotent; rebinding a
//! name to another key is refused.
//!
//! Resolve replies carry the registration as JSON text in the `json`
//! param:
//!
//! ```text
//! {"name":"site","requestKey":"USK@.../site/3","resolveURI":"indy://site"}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::message::{PluginMessage, PluginServer};
use crate::protocol::{
    codes, ACTION_REGISTER, ACTION_RESOLVE, PARAM_JSON, PARAM_NAME, PARAM_REQUEST_KEY,
    PARAM_RESOLVE_URI,
};

/// Scheme of the URIs handed out for registered names.
pub const RESOLVE_SCHEME: &str = "indy://";

/// Key types a name may point at.
const RESOLVABLE_KEY_TYPES: [&str; 4] = ["CHK@", "SSK@", "USK@", "KSK@"];

#[derive(Clone, Debug, Serialize)]
struct Registration {
    name: String,
    #[serde(rename = "requestKey")]
    request_key: String,
    #[serde(rename = "resolveURI")]
    resolve_uri: String,
}

/// Name registry served as a plugin.
#[derive(Default)]
pub struct LocalResolver {
    names: RwLock<HashMap<String, Registration>>,
}

impl LocalResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(&self, request: &PluginMessage) -> PluginMessage {
        let Some(name) = required(request, PARAM_NAME) else {
            return request.reply_error(codes::BAD_REQUEST, "missing name");
        };
        let name = name.to_lowercase();

        let names = self.names.read().unwrap_or_else(PoisonError::into_inner);
        let Some(registration) = names.get(&name) else {
            debug!(name = %name, "resolve miss");
            return request.reply_error(codes::NOT_FOUND, format!("name not registered: {}", name));
        };

        match serde_json::to_string(registration) {
            Ok(json) => request.reply_success(BTreeMap::from([(PARAM_JSON.to_string(), json)])),
            Err(e) => request.reply_error(codes::BAD_REQUEST, e.to_string()),
        }
    }

    fn register(&self, request: &PluginMessage) -> PluginMessage {
        let (Some(name), Some(request_key)) = (
            required(request, PARAM_NAME),
            required(request, PARAM_REQUEST_KEY),
        ) else {
            return request.reply_error(codes::BAD_REQUEST, "missing name or requestKey");
        };
        let name = name.to_lowercase();

        if name.contains(['/', '@']) || name.chars().any(char::is_whitespace) {
            return request.reply_error(codes::BAD_REQUEST, format!("invalid name: {}", name));
        }
        let upper = request_key.to_ascii_uppercase();
        if !RESOLVABLE_KEY_TYPES.iter().any(|tag| upper.starts_with(tag)) {
            return request.reply_error(
                codes::BAD_REQUEST,
                format!("invalid requestKey: {}", request_key),
            );
        }

        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = names.get(&name) {
            if existing.request_key != request_key {
                warn!(name = %name, "name already registered to another key");
                return request.reply_error(
                    codes::ALREADY_REGISTERED,
                    format!("name already registered: {}", name),
                );
            }
        }

        let registration = Registration {
            resolve_uri: format!("{}{}", RESOLVE_SCHEME, name),
            name: name.clone(),
            request_key: request_key.to_string(),
        };
        let reply = request.reply_success(BTreeMap::from([(
            PARAM_RESOLVE_URI.to_string(),
            registration.resolve_uri.clone(),
        )]));
        debug!(name = %name, request_key = %request_key, "name registered");
        names.insert(name, registration);
        reply
    }
}

impl PluginServer for LocalResolver {
    fn handle_request(&self, request: &PluginMessage) -> PluginMessage {
        match request.action() {
            Some(ACTION_RESOLVE) => self.resolve(request),
            Some(ACTION_REGISTER) => self.register(request),
            Some(other) => {
                request.reply_error(codes::UNKNOWN_ACTION, format!("unknown action: {}", other))
            }
            None => request.reply_error(codes::BAD_REQUEST, "missing action"),
        }
    }
}

impl core::fmt::Debug for LocalResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalResolver")
            .field("names", &self.len())
            .finish()
    }
}

fn required<'a>(request: &'a PluginMessage, key: &str) -> Option<&'a str> {
    request.param(key).map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(resolver: &LocalResolver, name: &str, key: &str) -> PluginMessage {
        resolver.handle_request(&PluginMessage::request(
            ACTION_REGISTER,
            &[(PARAM_NAME, name), (PARAM_REQUEST_KEY, key)],
        ))
    }

    fn resolve(resolver: &LocalResolver, name: &str) -> PluginMessage {
        resolver.handle_request(&PluginMessage::request(ACTION_RESOLVE, &[(PARAM_NAME, name)]))
    }

    #[test]
    fn test_register_then_resolve() {
        let resolver = LocalResolver::new();
        let reply = register(&resolver, "Site", "USK@abc,def,AQACAAE/site/3");
        assert!(reply.is_success());
        assert_eq!(reply.param(PARAM_RESOLVE_URI), Some("indy://site"));

        let reply = resolve(&resolver, "SITE");
        assert!(reply.is_success());
        let json: serde_json::Value =
            serde_json::from_str(reply.param(PARAM_JSON).unwrap()).unwrap();
        assert_eq!(json["name"], "site");
        assert_eq!(json["requestKey"], "USK@abc,def,AQACAAE/site/3");
        assert_eq!(json["resolveURI"], "indy://site");
    }

    #[test]
    fn test_resolve_unknown_name() {
        let resolver = LocalResolver::new();
        let reply = resolve(&resolver, "nobody");
        assert!(!reply.is_success());
        assert_eq!(reply.error_code.as_deref(), Some(codes::NOT_FOUND));
        assert_eq!(
            reply.error_message.as_deref(),
            Some("name not registered: nobody")
        );
    }

    #[test]
    fn test_register_is_idempotent_for_same_key() {
        let resolver = LocalResolver::new();
        assert!(register(&resolver, "a", "KSK@a").is_success());
        assert!(register(&resolver, "a", "KSK@a").is_success());
        assert_eq!(resolver.len(), 1);

        let reply = register(&resolver, "A", "KSK@b");
        assert_eq!(reply.error_code.as_deref(), Some(codes::ALREADY_REGISTERED));
    }

    #[test]
    fn test_register_validates_input() {
        let resolver = LocalResolver::new();
        for (name, key) in [("", "KSK@a"), ("a", ""), ("a/b", "KSK@a"), ("a", "http://x")] {
            let reply = register(&resolver, name, key);
            assert_eq!(
                reply.error_code.as_deref(),
                Some(codes::BAD_REQUEST),
                "{name:?} {key:?}"
            );
        }
        assert!(resolver.is_empty());
    }

    #[test]
    fn test_unknown_and_missing_action() {
        let resolver = LocalResolver::new();
        let reply = resolver.handle_request(&PluginMessage::request("resolver.delete", &[]));
        assert_eq!(reply.error_code.as_deref(), Some(codes::UNKNOWN_ACTION));

        let mut request = PluginMessage::request(ACTION_RESOLVE, &[]);
        request.params.clear();
        let reply = resolver.handle_request(&request);
        assert_eq!(reply.error_code.as_deref(), Some(codes::BAD_REQUEST));
    }
}
