//! Bucket key construction.

/// A key that identifies one bucket: namespace, route, and client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LimitKey {
    /// Namespace prefix shared by every key from the same builder
    pub namespace: String,
    /// Route or action being limited
    pub route: String,
    /// Client identifier (IP, user id, API key, ...)
    pub client: String,
}

impl LimitKey {
    /// Convert the key to its store representation, `namespace:route:client`.
    pub fn to_string_key(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.route, self.client)
    }
}

impl std::fmt::Display for LimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.route, self.client)
    }
}

impl From<&LimitKey> for String {
    fn from(key: &LimitKey) -> Self {
        key.to_string_key()
    }
}

/// Builds [`LimitKey`]s under a fixed namespace.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    namespace: String,
}

impl KeyBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, route: &str, client: &str) -> LimitKey {
        LimitKey {
            namespace: self.namespace.clone(),
            route: route.to_string(),
            client: client.to_string(),
        }
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("rate")
    }
}
