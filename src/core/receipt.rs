use crate::core::errors::ChiaTienError;
use crate::core::models::receipt::{ParsedReceipt, ReceiptItem};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectableItem {
    pub item: ReceiptItem,
    pub selected: bool,
}

impl SelectableItem {
    pub fn line_total(&self) -> u64 {
        self.item.price.saturating_mul(u64::from(self.item.quantity))
    }
}

/// Line items of a parsed receipt, each with a client-side `selected` flag.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptSelection {
    receipt_id: Option<String>,
    items: Vec<SelectableItem>,
}

impl ReceiptSelection {
    pub fn new(receipt_id: Option<String>, items: Vec<ReceiptItem>) -> Self {
        ReceiptSelection {
            receipt_id,
            items: items
                .into_iter()
                .map(|item| SelectableItem { item, selected: true })
                .collect(),
        }
    }

    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    pub fn items(&self) -> &[SelectableItem] {
        &self.items
    }

    pub fn selected_count(&self) -> usize {
        self.items.iter().filter(|i| i.selected).count()
    }

    /// Flips the item's flag and returns the new selected total.
    pub fn toggle_item(&mut self, index: usize) -> Result<u64, ChiaTienError> {
        let entry = self.items.get_mut(index).ok_or(ChiaTienError::ItemNotFound(index))?;
        entry.selected = !entry.selected;
        debug!("Receipt item {} ({}) selected={}", index, entry.item.name, entry.selected);
        Ok(self.selected_total())
    }

    pub fn selected_total(&self) -> u64 {
        self.items
            .iter()
            .filter(|i| i.selected)
            .fold(0u64, |acc, i| acc.saturating_add(i.line_total()))
    }

    /// Expense description derived from the selected items.
    pub fn description(&self) -> Option<String> {
        let mut selected = self.items.iter().filter(|i| i.selected);
        let first = selected.next()?;
        let count = 1 + selected.count();
        if count == 1 {
            Some(first.item.name.clone())
        } else {
            Some(format!("{} items ({}...)", count, first.item.name))
        }
    }
}

impl From<ParsedReceipt> for ReceiptSelection {
    fn from(receipt: ParsedReceipt) -> Self {
        let receipt_id = Some(receipt.receipt_id).filter(|id| !id.is_empty());
        ReceiptSelection::new(receipt_id, receipt.items)
    }
}
