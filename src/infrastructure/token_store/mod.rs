pub mod file;
pub mod in_memory;

use crate::core::errors::ChiaTienError;
use crate::core::models::user::User;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token and user kept between runs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: String,
    pub user: User,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<StoredCredentials>, ChiaTienError>;
    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ChiaTienError>;
    async fn clear(&self) -> Result<(), ChiaTienError>;
}
