use async_trait::async_trait;
use serde::Serialize;

/// The authenticated caller. Only gates access to the API; the pipeline never sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub username: String,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Resolves a bearer token to its user, or `None` if the token is not valid.
    async fn current_user(&self, token: &str) -> Option<User>;
}

/// Single shared token configured through `API_TOKEN`.
pub struct StaticTokenAuth {
    token: String,
    user: User,
}

impl StaticTokenAuth {
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user: User {
                username: username.into(),
            },
        }
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuth {
    async fn current_user(&self, token: &str) -> Option<User> {
        (!self.token.is_empty() && constant_time_eq(self.token.as_bytes(), token.as_bytes()))
            .then(|| self.user.clone())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
