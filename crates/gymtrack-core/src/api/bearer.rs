use std::sync::{Arc, RwLock};

/// Shared default `Authorization` header for API requests.
///
/// The session manager sets and clears it; every clone of the `ApiClient`
/// reads it when building a request.
#[derive(Clone, Default)]
pub struct BearerAuth {
    token: Arc<RwLock<Option<String>>>,
}

impl BearerAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: &str) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token.to_string());
    }

    pub fn clear(&self) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = None;
    }

    pub fn is_set(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Header value, e.g. `Bearer tok123`
    pub fn header_value(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|t| format!("Bearer {}", t))
    }
}

impl std::fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuth")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_token() {
        let auth = BearerAuth::new();
        let shared = auth.clone();
        assert_eq!(shared.header_value(), None);

        auth.set("tok123");
        assert_eq!(shared.header_value().as_deref(), Some("Bearer tok123"));

        shared.clear();
        assert!(!auth.is_set());
    }

    #[test]
    fn test_debug_hides_token() {
        let auth = BearerAuth::new();
        auth.set("secret-token");
        assert!(!format!("{:?}", auth).contains("secret-token"));
    }
}
