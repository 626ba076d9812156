use crate::core::errors::ChiaTienError;
use crate::infrastructure::token_store::{StoredCredentials, TokenStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryTokenStore {
    credentials: Arc<RwLock<Option<StoredCredentials>>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, ChiaTienError> {
        Ok(self.credentials.read().await.clone())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ChiaTienError> {
        *self.credentials.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ChiaTienError> {
        *self.credentials.write().await = None;
        Ok(())
    }
}
