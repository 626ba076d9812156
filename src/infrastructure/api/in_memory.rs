use crate::core::errors::ChiaTienError;
use crate::core::models::{
    expense::{Expense, ExpenseParticipant, GroupRef, MessageResponse, NewExpense, ParticipantShare, Payer},
    group::{Group, GroupDetail, GroupMember, GroupUpdate, NewGroup, UserRef},
    receipt::ParsedReceipt,
    user::{AuthResponse, User},
};
use crate::core::split::equal_share;
use crate::infrastructure::api::{AuthApi, ExpenseApi, GroupApi, ReceiptApi, RequestContext};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_EMOJI: &str = "💰";

#[derive(Clone, Debug)]
struct Account {
    password: String,
    user: User,
}

#[derive(Clone, Debug)]
struct StoredGroup {
    id: String,
    name: String,
    emoji: String,
    description: Option<String>,
    created_by: String,
    member_ids: Vec<String>,
}

/// Stand-in for the remote server, sharing state across clones.
///
/// Used by the test suite in place of the HTTP backend.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    accounts: Arc<RwLock<HashMap<String, Account>>>, // username -> account
    tokens: Arc<RwLock<HashMap<String, String>>>,    // token -> user_id
    groups: Arc<RwLock<HashMap<String, StoredGroup>>>,
    expenses: Arc<RwLock<Vec<Expense>>>,
    receipts: Arc<RwLock<VecDeque<ParsedReceipt>>>,
    next_expense_failure: Arc<RwLock<Option<ChiaTienError>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account directly and returns its user.
    pub async fn add_user(&self, username: &str, password: &str, display_name: &str) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            avatar: None,
        };
        self.accounts.write().await.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    /// Issues a token for an existing user without going through login.
    pub async fn issue_token(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(token.clone(), user_id.to_string());
        token
    }

    pub async fn add_member(&self, group_id: &str, user_id: &str) -> Result<(), ChiaTienError> {
        let mut groups = self.groups.write().await;
        let group = groups
            .get_mut(group_id)
            .ok_or_else(|| ChiaTienError::NotFound(format!("Group {} not found", group_id)))?;
        if !group.member_ids.iter().any(|id| id == user_id) {
            group.member_ids.push(user_id.to_string());
        }
        Ok(())
    }

    /// Queues the result the next `parse_receipt` call returns.
    pub async fn queue_receipt(&self, receipt: ParsedReceipt) {
        self.receipts.write().await.push_back(receipt);
    }

    /// Makes the next `create_expense` call fail with `error`.
    pub async fn fail_next_expense(&self, error: ChiaTienError) {
        *self.next_expense_failure.write().await = Some(error);
    }

    pub async fn expenses_snapshot(&self) -> Vec<Expense> {
        self.expenses.read().await.clone()
    }

    async fn authenticate(&self, ctx: &RequestContext) -> Result<User, ChiaTienError> {
        let token = ctx.auth_token.as_deref().ok_or(ChiaTienError::Unauthorized)?;
        let user_id = self
            .tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(ChiaTienError::Unauthorized)?;
        self.user_by_id(&user_id).await.ok_or(ChiaTienError::Unauthorized)
    }

    async fn user_by_id(&self, user_id: &str) -> Option<User> {
        self.accounts
            .read()
            .await
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
    }

    async fn group_for(&self, group_id: &str, user: &User) -> Result<StoredGroup, ChiaTienError> {
        let group = self
            .groups
            .read()
            .await
            .get(group_id)
            .cloned()
            .ok_or_else(|| ChiaTienError::NotFound(format!("Group {} not found", group_id)))?;
        if !group.member_ids.contains(&user.id) {
            return Err(ChiaTienError::Forbidden(format!("Not a member of group {}", group_id)));
        }
        Ok(group)
    }

    async fn members_of(&self, group: &StoredGroup, expenses: &[Expense]) -> Vec<GroupMember> {
        let users = futures::future::join_all(group.member_ids.iter().map(|id| self.user_by_id(id))).await;
        users
            .into_iter()
            .flatten()
            .map(|user| GroupMember {
                balance: Some(balance_of(&user.id, expenses)),
                id: user.id,
                display_name: user.display_name,
                avatar: user.avatar,
            })
            .collect()
    }

    async fn group_expenses(&self, group_id: &str) -> Vec<Expense> {
        self.expenses
            .read()
            .await
            .iter()
            .filter(|e| e.group.as_ref().is_some_and(|g| g.id == group_id))
            .cloned()
            .collect()
    }

    async fn summary(&self, group: &StoredGroup, user: &User) -> Group {
        let expenses = self.group_expenses(&group.id).await;
        let members = self.members_of(group, &expenses).await;
        Group {
            id: group.id.clone(),
            name: group.name.clone(),
            emoji: group.emoji.clone(),
            description: group.description.clone(),
            member_count: members.len(),
            expense_count: expenses.len(),
            balance: balance_of(&user.id, &expenses),
            members,
        }
    }

    async fn issue_auth(&self, user: User) -> AuthResponse {
        let token = self.issue_token(&user.id).await;
        AuthResponse { token, user }
    }
}

/// Net position of `user_id`: unsettled shares others owe them minus what they owe.
fn balance_of(user_id: &str, expenses: &[Expense]) -> i64 {
    let mut balance: i64 = 0;
    for expense in expenses {
        for share in expense.participants.iter().filter(|p| !p.settled) {
            let amount = i64::try_from(share.amount).unwrap_or(i64::MAX);
            if expense.paid_by.id == user_id && share.user_id != user_id {
                balance = balance.saturating_add(amount);
            } else if share.user_id == user_id && expense.paid_by.id != user_id {
                balance = balance.saturating_sub(amount);
            }
        }
    }
    balance
}

#[async_trait]
impl AuthApi for InMemoryBackend {
    async fn login(&self, _ctx: &RequestContext, username: &str, password: &str) -> Result<AuthResponse, ChiaTienError> {
        let account = self
            .accounts
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(ChiaTienError::InvalidCredentials)?;
        if account.password != password {
            return Err(ChiaTienError::InvalidCredentials);
        }
        debug!(username, "Login accepted");
        Ok(self.issue_auth(account.user).await)
    }

    async fn register(
        &self,
        _ctx: &RequestContext,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse, ChiaTienError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ChiaTienError::Validation("Username and password are required".to_string()));
        }
        if self.accounts.read().await.contains_key(username) {
            return Err(ChiaTienError::UsernameTaken(username.to_string()));
        }
        let user = self
            .add_user(username, password, display_name.unwrap_or(username))
            .await;
        Ok(self.issue_auth(user).await)
    }
}

#[async_trait]
impl GroupApi for InMemoryBackend {
    async fn list_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        let mine: Vec<StoredGroup> = self
            .groups
            .read()
            .await
            .values()
            .filter(|g| g.member_ids.contains(&user.id))
            .cloned()
            .collect();
        let mut groups = Vec::with_capacity(mine.len());
        for group in &mine {
            groups.push(self.summary(group, &user).await);
        }
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn get_group(&self, ctx: &RequestContext, group_id: &str) -> Result<GroupDetail, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        let group = self.group_for(group_id, &user).await?;
        let expenses = self.group_expenses(group_id).await;
        let members = self.members_of(&group, &expenses).await;
        let creator = self.user_by_id(&group.created_by).await;
        Ok(GroupDetail {
            id: group.id.clone(),
            name: group.name.clone(),
            emoji: group.emoji.clone(),
            description: group.description.clone(),
            balance: balance_of(&user.id, &expenses),
            members,
            created_by: UserRef {
                id: group.created_by.clone(),
                display_name: creator.map(|u| u.display_name).unwrap_or_default(),
            },
            total_expenses: expenses.iter().fold(0u64, |acc, e| acc.saturating_add(e.amount)),
            expenses,
        })
    }

    async fn create_group(&self, ctx: &RequestContext, group: &NewGroup) -> Result<Group, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        if group.name.trim().is_empty() {
            return Err(ChiaTienError::Validation("Group name is required".to_string()));
        }
        let stored = StoredGroup {
            id: Uuid::new_v4().to_string(),
            name: group.name.trim().to_string(),
            emoji: group.emoji.clone().unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            description: group.description.clone(),
            created_by: user.id.clone(),
            member_ids: vec![user.id.clone()],
        };
        self.groups.write().await.insert(stored.id.clone(), stored.clone());
        Ok(self.summary(&stored, &user).await)
    }

    async fn update_group(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        update: &GroupUpdate,
    ) -> Result<Group, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        self.group_for(group_id, &user).await?;
        let updated = {
            let mut groups = self.groups.write().await;
            let group = groups
                .get_mut(group_id)
                .ok_or_else(|| ChiaTienError::NotFound(format!("Group {} not found", group_id)))?;
            if let Some(name) = &update.name {
                group.name = name.clone();
            }
            if let Some(emoji) = &update.emoji {
                group.emoji = emoji.clone();
            }
            if let Some(description) = &update.description {
                group.description = Some(description.clone());
            }
            group.clone()
        };
        Ok(self.summary(&updated, &user).await)
    }

    async fn delete_group(&self, ctx: &RequestContext, group_id: &str) -> Result<MessageResponse, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        let group = self.group_for(group_id, &user).await?;
        if group.created_by != user.id {
            return Err(ChiaTienError::Forbidden("Only the creator can delete a group".to_string()));
        }
        self.groups.write().await.remove(group_id);
        self.expenses
            .write()
            .await
            .retain(|e| e.group.as_ref().is_none_or(|g| g.id != group_id));
        Ok(MessageResponse {
            message: "Group deleted".to_string(),
        })
    }
}

#[async_trait]
impl ExpenseApi for InMemoryBackend {
    async fn list_expenses(&self, ctx: &RequestContext, group_id: Option<&str>) -> Result<Vec<Expense>, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        if let Some(group_id) = group_id {
            self.group_for(group_id, &user).await?;
            return Ok(self.group_expenses(group_id).await);
        }
        let groups = self.groups.read().await;
        Ok(self
            .expenses
            .read()
            .await
            .iter()
            .filter(|e| {
                e.group
                    .as_ref()
                    .and_then(|g| groups.get(&g.id))
                    .is_some_and(|g| g.member_ids.contains(&user.id))
            })
            .cloned()
            .collect())
    }

    async fn create_expense(&self, ctx: &RequestContext, expense: &NewExpense) -> Result<Expense, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        if let Some(error) = self.next_expense_failure.write().await.take() {
            return Err(error);
        }
        let group = self.group_for(&expense.group_id, &user).await?;
        if expense.amount == 0 {
            return Err(ChiaTienError::Validation("Amount must be positive".to_string()));
        }

        let payer_id = expense.paid_by_id.clone().unwrap_or_else(|| user.id.clone());
        if !group.member_ids.contains(&payer_id) {
            return Err(ChiaTienError::Validation(format!("Payer {} is not a group member", payer_id)));
        }
        let payer = self
            .user_by_id(&payer_id)
            .await
            .ok_or_else(|| ChiaTienError::Validation(format!("Unknown payer {}", payer_id)))?;

        // Without explicit shares the server splits evenly across the group.
        let shares = match &expense.participants {
            Some(shares) => shares.clone(),
            None => {
                let each = equal_share(expense.amount, group.member_ids.len());
                group
                    .member_ids
                    .iter()
                    .map(|id| ParticipantShare {
                        user_id: id.clone(),
                        amount: each,
                    })
                    .collect()
            }
        };

        let participants = shares
            .into_iter()
            .map(|share| {
                let group = &group;
                let payer_id = &payer.id;
                async move {
                    if !group.member_ids.contains(&share.user_id) {
                        return Err(ChiaTienError::Validation(format!(
                            "Participant {} is not a group member",
                            share.user_id
                        )));
                    }
                    let member = self.user_by_id(&share.user_id).await.ok_or_else(|| {
                        ChiaTienError::Validation(format!("Unknown participant {}", share.user_id))
                    })?;
                    Ok(ExpenseParticipant {
                        settled: &share.user_id == payer_id,
                        user_id: share.user_id,
                        amount: share.amount,
                        user: UserRef {
                            id: member.id,
                            display_name: member.display_name,
                        },
                    })
                }
            })
            .collect::<Vec<_>>();
        let participants = futures::future::try_join_all(participants).await?;

        let created = Expense {
            id: Uuid::new_v4().to_string(),
            amount: expense.amount,
            description: expense.description.clone(),
            date: expense.date.unwrap_or_else(Utc::now),
            receipt_url: expense
                .receipt_id
                .as_ref()
                .map(|id| format!("memory://receipts/{}", id)),
            paid_by: Payer {
                id: payer.id,
                display_name: payer.display_name,
                avatar: payer.avatar,
            },
            participants,
            group: Some(GroupRef {
                id: group.id,
                name: group.name,
                emoji: group.emoji,
            }),
        };
        self.expenses.write().await.push(created.clone());
        debug!(expense_id = %created.id, amount = created.amount, "Expense stored");
        Ok(created)
    }

    async fn delete_expense(&self, ctx: &RequestContext, expense_id: &str) -> Result<MessageResponse, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        let mut expenses = self.expenses.write().await;
        let index = expenses
            .iter()
            .position(|e| e.id == expense_id)
            .ok_or_else(|| ChiaTienError::NotFound(format!("Expense {} not found", expense_id)))?;
        if expenses[index].paid_by.id != user.id {
            return Err(ChiaTienError::Forbidden("Only the payer can delete an expense".to_string()));
        }
        expenses.remove(index);
        Ok(MessageResponse {
            message: "Expense deleted".to_string(),
        })
    }

    async fn settle_expense(
        &self,
        ctx: &RequestContext,
        expense_id: &str,
        participant_user_id: Option<&str>,
    ) -> Result<MessageResponse, ChiaTienError> {
        let user = self.authenticate(ctx).await?;
        let mut expenses = self.expenses.write().await;
        let expense = expenses
            .iter_mut()
            .find(|e| e.id == expense_id)
            .ok_or_else(|| ChiaTienError::NotFound(format!("Expense {} not found", expense_id)))?;
        if !expense.participants.iter().any(|p| p.user_id == user.id) && expense.paid_by.id != user.id {
            return Err(ChiaTienError::Forbidden("Not part of this expense".to_string()));
        }
        let mut touched = 0;
        for participant in expense
            .participants
            .iter_mut()
            .filter(|p| participant_user_id.is_none_or(|id| p.user_id == id))
        {
            participant.settled = true;
            touched += 1;
        }
        if touched == 0 {
            return Err(ChiaTienError::NotFound("Participant not found".to_string()));
        }
        Ok(MessageResponse {
            message: "Expense settled".to_string(),
        })
    }
}

#[async_trait]
impl ReceiptApi for InMemoryBackend {
    async fn parse_receipt(&self, ctx: &RequestContext, image_base64: &str) -> Result<ParsedReceipt, ChiaTienError> {
        self.authenticate(ctx).await?;
        if image_base64.is_empty() {
            return Err(ChiaTienError::Validation("Image is required".to_string()));
        }
        self.receipts
            .write()
            .await
            .pop_front()
            .ok_or_else(|| ChiaTienError::ServerError("Could not parse receipt".to_string()))
    }
}
