use crate::core::errors::ChiaTienError;
use crate::core::models::user::{AuthResponse, User};
use crate::infrastructure::api::{AuthApi, RequestContext};
use crate::infrastructure::token_store::{StoredCredentials, TokenStore};
use log::{error, info};

/// Signed-in state of the client.
///
/// Owns the token explicitly; callers get it through [`AuthSession::context`]
/// and hand that to every collaborator call.
pub struct AuthSession<A: AuthApi, T: TokenStore> {
    auth: A,
    store: T,
    base_url: String,
    credentials: Option<StoredCredentials>,
}

impl<A: AuthApi, T: TokenStore> AuthSession<A, T> {
    pub fn new(auth: A, store: T, base_url: impl Into<String>) -> Self {
        AuthSession {
            auth,
            store,
            base_url: base_url.into(),
            credentials: None,
        }
    }

    /// Picks up credentials persisted by an earlier run.
    ///
    /// A broken store leaves the session signed out rather than failing.
    pub async fn restore(&mut self) -> bool {
        match self.store.load().await {
            Ok(Some(credentials)) => {
                info!("Restored session for {}", credentials.user.username);
                self.credentials = Some(credentials);
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("Error loading stored credentials: {}", e);
                false
            }
        }
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, ChiaTienError> {
        let response = self.auth.login(&self.anonymous(), username, password).await?;
        self.accept(response).await
    }

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<&User, ChiaTienError> {
        let response = self
            .auth
            .register(&self.anonymous(), username, password, display_name)
            .await?;
        self.accept(response).await
    }

    pub async fn logout(&mut self) -> Result<(), ChiaTienError> {
        self.store.clear().await?;
        if let Some(credentials) = self.credentials.take() {
            info!("Signed out {}", credentials.user.username);
        }
        Ok(())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|c| &c.user)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn context(&self) -> RequestContext {
        RequestContext {
            base_url: self.base_url.clone(),
            auth_token: self.credentials.as_ref().map(|c| c.token.clone()),
        }
    }

    fn anonymous(&self) -> RequestContext {
        RequestContext::anonymous(self.base_url.clone())
    }

    async fn accept(&mut self, response: AuthResponse) -> Result<&User, ChiaTienError> {
        let credentials = StoredCredentials {
            token: response.token,
            user: response.user,
        };
        self.store.save(&credentials).await?;
        info!("Signed in as {}", credentials.user.username);
        let credentials = self.credentials.insert(credentials);
        Ok(&credentials.user)
    }
}
