use crate::core::amount::parse_amount;
use crate::core::errors::ChiaTienError;
use crate::core::models::{
    expense::{Expense, MessageResponse, NewExpense},
    group::{Group, GroupDetail, GroupUpdate, NewGroup},
    participant::RosterEntry,
};
use crate::core::receipt::ReceiptSelection;
use crate::core::split::{SplitAllocator, SplitMode};
use crate::infrastructure::api::{ExpenseApi, GroupApi, ReceiptApi, RequestContext};
use log::{debug, info, warn};

/// An expense being entered: the group it goes to, its split session and,
/// for receipt-based entry, the parsed line items.
#[derive(Clone, Debug)]
pub struct ExpenseDraft {
    group_id: String,
    description: String,
    allocator: SplitAllocator,
    receipt: Option<ReceiptSelection>,
}

impl ExpenseDraft {
    pub fn manual(group_id: impl Into<String>, allocator: SplitAllocator) -> Self {
        ExpenseDraft {
            group_id: group_id.into(),
            description: String::new(),
            allocator,
            receipt: None,
        }
    }

    pub fn from_receipt(group_id: impl Into<String>, mut allocator: SplitAllocator, receipt: ReceiptSelection) -> Self {
        allocator.set_total(receipt.selected_total());
        ExpenseDraft {
            group_id: group_id.into(),
            description: String::new(),
            allocator,
            receipt: Some(receipt),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn allocator(&self) -> &SplitAllocator {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut SplitAllocator {
        &mut self.allocator
    }

    pub fn receipt(&self) -> Option<&ReceiptSelection> {
        self.receipt.as_ref()
    }

    pub fn is_receipt(&self) -> bool {
        self.receipt.is_some()
    }

    /// Takes the total as typed, e.g. `"1.250.000"`.
    ///
    /// Receipt drafts take their total from the selected items only.
    pub fn set_amount_text(&mut self, text: &str) -> Result<u64, ChiaTienError> {
        if self.receipt.is_some() {
            return Err(ChiaTienError::invalid_input(
                "amount",
                "Amount comes from the receipt",
                "Select or deselect receipt items to change the total",
            ));
        }
        let amount = parse_amount(text)?;
        self.allocator.set_total(amount);
        Ok(amount)
    }

    /// Sets a manual share from typed input.
    pub fn set_participant_amount_text(&mut self, user_id: &str, text: &str) -> Result<u64, ChiaTienError> {
        let amount = parse_amount(text)?;
        self.allocator.set_participant_amount(user_id, amount)?;
        Ok(amount)
    }

    /// Toggles a receipt line item; the new selected total becomes the split total.
    pub fn toggle_item(&mut self, index: usize) -> Result<u64, ChiaTienError> {
        let receipt = self.receipt.as_mut().ok_or(ChiaTienError::NotAReceipt)?;
        let total = receipt.toggle_item(index)?;
        self.allocator.set_total(total);
        Ok(total)
    }

    /// Checks the draft and builds the request body for the expense service.
    ///
    /// Leaves the draft untouched whatever the outcome.
    pub fn to_new_expense(&self) -> Result<NewExpense, ChiaTienError> {
        let description = match &self.receipt {
            Some(receipt) => {
                let generated = receipt.description().ok_or(ChiaTienError::NoItemsSelected)?;
                if self.allocator.total() != receipt.selected_total() {
                    return Err(ChiaTienError::invalid_input(
                        "amount",
                        "Amount does not match the receipt",
                        format!(
                            "total {} differs from the selected items {}",
                            self.allocator.total(),
                            receipt.selected_total()
                        ),
                    ));
                }
                match self.description.trim() {
                    "" => generated,
                    typed => typed.to_string(),
                }
            }
            None => {
                if self.allocator.total() == 0 {
                    return Err(ChiaTienError::InvalidAmount);
                }
                let trimmed = self.description.trim();
                if trimmed.is_empty() {
                    return Err(ChiaTienError::MissingDescription);
                }
                trimmed.to_string()
            }
        };

        let allocation = self.allocator.finalize()?;
        Ok(NewExpense {
            group_id: self.group_id.clone(),
            amount: allocation.amount,
            description,
            date: None,
            paid_by_id: Some(allocation.payer_id),
            participants: Some(allocation.participants),
            receipt_id: self
                .receipt
                .as_ref()
                .and_then(|r| r.receipt_id())
                .map(String::from),
        })
    }
}

/// Expense-entry flow on top of the group, expense and receipt services.
pub struct ExpenseService<G: GroupApi, E: ExpenseApi, R: ReceiptApi> {
    groups: G,
    expenses: E,
    receipts: R,
}

impl<G: GroupApi, E: ExpenseApi, R: ReceiptApi> ExpenseService<G, E, R> {
    pub fn new(groups: G, expenses: E, receipts: R) -> Self {
        info!("Initializing ExpenseService");
        ExpenseService {
            groups,
            expenses,
            receipts,
        }
    }

    pub async fn list_groups(&self, ctx: &RequestContext) -> Result<Vec<Group>, ChiaTienError> {
        self.groups.list_groups(ctx).await
    }

    pub async fn group_detail(&self, ctx: &RequestContext, group_id: &str) -> Result<GroupDetail, ChiaTienError> {
        self.groups.get_group(ctx, group_id).await
    }

    /// Creates a group with the caller as its only member.
    pub async fn create_group(&self, ctx: &RequestContext, group: &NewGroup) -> Result<Group, ChiaTienError> {
        let name = group.name.trim();
        if name.is_empty() {
            return Err(ChiaTienError::invalid_input(
                "name",
                "Group name required",
                "Enter a name for the group",
            ));
        }
        let request = NewGroup {
            name: name.to_string(),
            ..group.clone()
        };
        let created = self.groups.create_group(ctx, &request).await?;
        info!("Created group {} ({})", created.name, created.id);
        Ok(created)
    }

    pub async fn update_group(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        update: &GroupUpdate,
    ) -> Result<Group, ChiaTienError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ChiaTienError::invalid_input(
                "name",
                "Group name required",
                "A group name cannot be blank",
            ));
        }
        info!("Updating group {}", group_id);
        self.groups.update_group(ctx, group_id, update).await
    }

    pub async fn delete_group(&self, ctx: &RequestContext, group_id: &str) -> Result<MessageResponse, ChiaTienError> {
        info!("Deleting group {}", group_id);
        self.groups.delete_group(ctx, group_id).await
    }

    pub async fn list_expenses(
        &self,
        ctx: &RequestContext,
        group_id: Option<&str>,
    ) -> Result<Vec<Expense>, ChiaTienError> {
        self.expenses.list_expenses(ctx, group_id).await
    }

    pub async fn settle_expense(
        &self,
        ctx: &RequestContext,
        expense_id: &str,
        participant_user_id: Option<&str>,
    ) -> Result<MessageResponse, ChiaTienError> {
        info!("Settling expense {}", expense_id);
        self.expenses
            .settle_expense(ctx, expense_id, participant_user_id)
            .await
    }

    pub async fn delete_expense(&self, ctx: &RequestContext, expense_id: &str) -> Result<MessageResponse, ChiaTienError> {
        info!("Deleting expense {}", expense_id);
        self.expenses.delete_expense(ctx, expense_id).await
    }

    /// Opens a manual draft for `group_id`, everyone selected, equal split.
    pub async fn start_manual(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        current_user_id: Option<&str>,
    ) -> Result<ExpenseDraft, ChiaTienError> {
        let allocator = self.allocator_for(ctx, group_id, current_user_id).await?;
        info!("Started manual expense for group {}", group_id);
        Ok(ExpenseDraft::manual(group_id, allocator))
    }

    /// Sends the photographed receipt for parsing and opens a draft over its items.
    pub async fn start_receipt(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        current_user_id: Option<&str>,
        image_base64: &str,
    ) -> Result<ExpenseDraft, ChiaTienError> {
        let allocator = self.allocator_for(ctx, group_id, current_user_id).await?;
        let parsed = self.receipts.parse_receipt(ctx, image_base64).await?;
        info!(
            "Parsed receipt {} with {} items for group {}",
            parsed.receipt_id,
            parsed.items.len(),
            group_id
        );
        Ok(ExpenseDraft::from_receipt(group_id, allocator, parsed.into()))
    }

    /// Moves a draft to another group; the split restarts from the new roster.
    pub async fn switch_group(
        &self,
        ctx: &RequestContext,
        draft: &mut ExpenseDraft,
        group_id: &str,
        current_user_id: Option<&str>,
    ) -> Result<(), ChiaTienError> {
        let group = self.groups.get_group(ctx, group_id).await?;
        draft.allocator.reset_roster(group.members.iter().map(RosterEntry::from));
        default_payer(&mut draft.allocator, &group, current_user_id);
        draft.group_id = group_id.to_string();
        info!("Draft moved to group {}", group_id);
        Ok(())
    }

    /// Submits the draft. On failure the draft is left as it was so the user
    /// can correct it and retry.
    pub async fn submit(&self, ctx: &RequestContext, draft: &ExpenseDraft) -> Result<Expense, ChiaTienError> {
        let payload = draft.to_new_expense().inspect_err(|e| {
            warn!("Draft for group {} not ready: {}", draft.group_id, e);
        })?;
        if draft.allocator.mode() == SplitMode::Manual {
            debug!(
                "Submitting manual split: {} allocated of {}",
                draft.allocator.allocated_total(),
                payload.amount
            );
        }
        let expense = self.expenses.create_expense(ctx, &payload).await.inspect_err(|e| {
            warn!("Expense submission for group {} failed: {}", draft.group_id, e);
        })?;
        info!("Expense {} created in group {}", expense.id, draft.group_id);
        Ok(expense)
    }

    async fn allocator_for(
        &self,
        ctx: &RequestContext,
        group_id: &str,
        current_user_id: Option<&str>,
    ) -> Result<SplitAllocator, ChiaTienError> {
        let group = self.groups.get_group(ctx, group_id).await?;
        let mut allocator = SplitAllocator::new(group.members.iter().map(RosterEntry::from));
        default_payer(&mut allocator, &group, current_user_id);
        Ok(allocator)
    }
}

/// The current user pays by default; otherwise the first member does.
fn default_payer(allocator: &mut SplitAllocator, group: &GroupDetail, current_user_id: Option<&str>) {
    let candidate = current_user_id
        .filter(|id| group.member(id).is_some())
        .or_else(|| group.members.first().map(|m| m.id.as_str()));
    if let Some(payer) = candidate {
        if allocator.set_payer(payer).is_err() {
            warn!("Default payer {} missing from roster", payer);
        }
    }
}
