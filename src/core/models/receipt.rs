use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptItem {
    pub name: String,
    pub price: u64,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedReceipt {
    pub receipt_id: String,
    pub image_url: String,
    pub items: Vec<ReceiptItem>,
    pub total: u64,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReceiptRequest {
    pub image_base64: String,
}
