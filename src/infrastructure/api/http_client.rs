use crate::core::errors::ChiaTienError;
use crate::core::models::{
    expense::{Expense, MessageResponse, NewExpense, SettleRequest},
    group::{Group, GroupDetail, GroupUpdate, NewGroup},
    receipt::{ParseReceiptRequest, ParsedReceipt},
    user::{AuthResponse, LoginRequest, RegisterRequest},
};
use crate::infrastructure::api::{AuthApi, ExpenseApi, GroupApi, ReceiptApi, RequestContext};
use async_trait::async_trait;
use http::{Method, StatusCode, header};
use reqwest::Url;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, error};

const FALLBACK_ERROR: &str = "Request failed";

/// REST client for the expense server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(timeout: Duration) -> Result<Self, ChiaTienError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChiaTienError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpBackend { http })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint(ctx: &RequestContext, segments: &[&str]) -> Result<Url, ChiaTienError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(ChiaTienError::invalid_input(
                "id",
                "Invalid identifier",
                format!("`{}` cannot be used as a path segment", bad),
            ));
        }
        let invalid = |reason: String| ChiaTienError::ConfigError(format!("invalid base_url {}: {}", ctx.base_url, reason));
        let mut url = Url::parse(&ctx.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T, B>(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T, ChiaTienError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let path = url.path().to_string();
        debug!(%method, %url, "Fetching");

        let mut builder = self
            .http
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = &ctx.auth_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!(error = %e, %path, "API request failed");
            ChiaTienError::TransportError(e.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChiaTienError::TransportError(e.to_string()))?;

        let data: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            let preview: String = text.chars().take(200).collect();
            error!(%status, body = %preview, "Response is not JSON");
            ChiaTienError::InvalidResponse(format!("non-JSON body with status {}", status))
        })?;

        if !status.is_success() {
            let message = data
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or(FALLBACK_ERROR)
                .to_string();
            error!(%status, %message, %path, "API error");
            return Err(map_status(status, message));
        }

        serde_json::from_value(data).map_err(|e| ChiaTienError::InvalidResponse(e.to_string()))
    }
}

fn map_status(status: StatusCode, message: String) -> ChiaTienError {
    match status {
        StatusCode::UNAUTHORIZED => ChiaTienError::Unauthorized,
        StatusCode::FORBIDDEN => ChiaTienError::Forbidden(message),
        StatusCode::NOT_FOUND => ChiaTienError::NotFound(message),
        StatusCode::CONFLICT => ChiaTienError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ChiaTienError::Validation(message),
        _ => ChiaTienError::ServerError(message),
    }
}

#[async_trait]
impl AuthApi for HttpBackend {
    async fn login(&self, ctx: &RequestContext, username: &str, password: &str) -> Result<AuthResponse, ChiaTienError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let url = Self::endpoint(ctx, &["api", "auth", "login"])?;
        self.request(ctx, Method::POST, url, Some(&body))
            .await
            .map_err(|e| match e {
                ChiaTienError::Unauthorized => ChiaTienError::InvalidCredentials,
                other => other,
            })
    }

    async fn register(
        &self,
        ctx: &RequestContext,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse, ChiaTienError> {
        let body = RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
            display_name: display_name.map(String::from),
        };
        let url = Self::endpoint(ctx, &["api", "auth", "register"])?;
        self.request(ctx, Method::POST, url, Some(&body))
            .await
            .map_err(|e| match e {
                ChiaTienError::Conflict(_) => ChiaTienError::UsernameTaken(username.to_string()),
                other => other,
            })
    }
}

#[async_trait]
impl GroupApi for HttpBackend {
    async fn list_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "groups"])?;
        self.request::<_, ()>(ctx, Method::GET, url, None).await
    }

    async fn get_group(&self, ctx: &RequestContext, group_id: &str) -> Result<GroupDetail, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "groups", group_id])?;
        self.request::<_, ()>(ctx, Method::GET, url, None).await
    }

    async fn create_group(&self, ctx: &RequestContext, group: &NewGroup) -> Result<Group, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "groups"])?;
        self.request(ctx, Method::POST, url, Some(group)).await
    }

    async fn update_group(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        update: &GroupUpdate,
    ) -> Result<Group, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "groups", group_id])?;
        self.request(ctx, Method::PUT, url, Some(update)).await
    }

    async fn delete_group(&self, ctx: &RequestContext, group_id: &str) -> Result<MessageResponse, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "groups", group_id])?;
        self.request::<_, ()>(ctx, Method::DELETE, url, None).await
    }
}

#[async_trait]
impl ExpenseApi for HttpBackend {
    async fn list_expenses(&self, ctx: &RequestContext, group_id: Option<&str>) -> Result<Vec<Expense>, ChiaTienError> {
        let mut url = Self::endpoint(ctx, &["api", "expenses"])?;
        if let Some(id) = group_id {
            url.query_pairs_mut().append_pair("groupId", id);
        }
        self.request::<_, ()>(ctx, Method::GET, url, None).await
    }

    async fn create_expense(&self, ctx: &RequestContext, expense: &NewExpense) -> Result<Expense, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "expenses"])?;
        self.request(ctx, Method::POST, url, Some(expense)).await
    }

    async fn delete_expense(&self, ctx: &RequestContext, expense_id: &str) -> Result<MessageResponse, ChiaTienError> {
        let url = Self::endpoint(ctx, &["api", "expenses", expense_id])?;
        self.request::<_, ()>(ctx, Method::DELETE, url, None).await
    }

    async fn settle_expense(
        &self,
        ctx: &RequestContext,
        expense_id: &str,
        participant_user_id: Option<&str>,
    ) -> Result<MessageResponse, ChiaTienError> {
        let body = SettleRequest {
            participant_user_id: participant_user_id.map(String::from),
        };
        let url = Self::endpoint(ctx, &["api", "expenses", expense_id])?;
        self.request(ctx, Method::PATCH, url, Some(&body)).await
    }
}

#[async_trait]
impl ReceiptApi for HttpBackend {
    async fn parse_receipt(&self, ctx: &RequestContext, image_base64: &str) -> Result<ParsedReceipt, ChiaTienError> {
        let body = ParseReceiptRequest {
            image_base64: image_base64.to_string(),
        };
        let url = Self::endpoint(ctx, &["api", "receipts", "parse"])?;
        self.request(ctx, Method::POST, url, Some(&body)).await
    }
}
