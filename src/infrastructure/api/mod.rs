pub mod http_client;
pub mod in_memory;

use crate::core::errors::ChiaTienError;
use crate::core::models::{
    expense::{Expense, MessageResponse, NewExpense},
    group::{Group, GroupDetail, GroupUpdate, NewGroup},
    receipt::ParsedReceipt,
    user::AuthResponse,
};
use async_trait::async_trait;

/// Where and as whom a call is made. Passed into every collaborator call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub base_url: String,
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RequestContext {
    pub fn anonymous(base_url: impl Into<String>) -> Self {
        RequestContext {
            base_url: base_url.into(),
            auth_token: None,
        }
    }

    pub fn with_token(&self, token: impl Into<String>) -> Self {
        RequestContext {
            base_url: self.base_url.clone(),
            auth_token: Some(token.into()),
        }
    }
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, ctx: &RequestContext, username: &str, password: &str) -> Result<AuthResponse, ChiaTienError>;
    async fn register(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse, ChiaTienError>;
}

#[async_trait]
pub trait GroupApi: Send + Sync {
    async fn list_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>, ChiaTienError>;
    async fn get_group(&self, ctx: &RequestContext, group_id: &str) -> Result<GroupDetail, ChiaTienError>;
    async fn create_group(&self, ctx: &RequestContext, group: &NewGroup) -> Result<Group, ChiaTienError>;
    async fn update_group(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        update: &GroupUpdate,
    ) -> Result<Group, ChiaTienError>;
    async fn delete_group(&self, ctx: &RequestContext, group_id: &str) -> Result<MessageResponse, ChiaTienError>;
}

#[async_trait]
pub trait ExpenseApi: Send + Sync {
    async fn list_expenses(&self, ctx: &RequestContext, group_id: Option<&str>) -> Result<Vec<Expense>, ChiaTienError>;
    async fn create_expense(&self, ctx: &RequestContext, expense: &NewExpense) -> Result<Expense, ChiaTienError>;
    async fn delete_expense(&self, ctx: &RequestContext, expense_id: &str) -> Result<MessageResponse, ChiaTienError>;
    /// Marks a participant's share (or the whole expense when `None`) as settled.
    async fn settle_expense(
        &self,
        ctx: &RequestContext,
        expense_id: &str,
        participant_user_id: Option<&str>,
    ) -> Result<MessageResponse, ChiaTienError>;
}

#[async_trait]
pub trait ReceiptApi: Send + Sync {
    async fn parse_receipt(&self, ctx: &RequestContext, image_base64: &str) -> Result<ParsedReceipt, ChiaTienError>;
}
