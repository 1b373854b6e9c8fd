//! Transaction types for Davcoin

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A value transfer waiting in the mempool or recorded in a block.
///
/// `amount` keeps the exact JSON number it was created from so that a block
/// received from a peer re-serializes to the same bytes it was hashed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: Number,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: impl Into<Number>,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            amount: amount.into(),
        }
    }
}

/// An unvalidated transaction submission as sent by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub receiver: Option<String>,
    #[serde(default)]
    pub amount: Option<Number>,
}
