//! Session context shared by the data client and orchestrators. The login flow owns its lifecycle; the core only reads it.

use std::sync::{Arc, RwLock};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub role: String,
}

#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context already populated, e.g. from a token read at startup.
    pub fn with_session(token: impl Into<String>, role: impl Into<String>) -> Self {
        let ctx = Self::new();
        ctx.login(token, role);
        ctx
    }

    /// Called by the login flow. An empty token leaves the context signed out.
    pub fn login(&self, token: impl Into<String>, role: impl Into<String>) {
        let token = token.into();
        let session = if token.trim().is_empty() {
            None
        } else {
            Some(Session {
                token,
                role: role.into(),
            })
        };
        if let Ok(mut guard) = self.inner.write() {
            *guard = session;
        }
    }

    pub fn logout(&self) {
        if let Ok(mut guard) = self.inner.write() {
            *guard = None;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.token.clone()))
    }

    pub fn role(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.role.clone()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_session() {
        let ctx = SessionContext::new();
        let reader = ctx.clone();
        assert!(!reader.is_authenticated());
        ctx.login("tok", "admin");
        assert_eq!(reader.token().as_deref(), Some("tok"));
        assert_eq!(reader.role().as_deref(), Some("admin"));
        ctx.logout();
        assert_eq!(reader.role(), None);
    }

    #[test]
    fn blank_token_is_not_a_session() {
        let ctx = SessionContext::with_session("   ", "admin");
        assert!(!ctx.is_authenticated());
    }
}
