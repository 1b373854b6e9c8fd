use crate::error::ChainError;
use crate::transaction::types::{Transaction, TransactionRequest};

impl TransactionRequest {
    /// Names of the required fields absent from this request.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.sender.is_none() {
            missing.push("sender");
        }
        if self.receiver.is_none() {
            missing.push("receiver");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        missing
    }

    /// Turn the request into a transaction once all fields are present.
    ///
    /// Only presence is checked. Empty strings and zero or negative amounts
    /// are accepted as-is.
    pub fn validate(self) -> Result<Transaction, ChainError> {
        match (self.sender, self.receiver, self.amount) {
            (Some(sender), Some(receiver), Some(amount)) => Ok(Transaction {
                sender,
                receiver,
                amount,
            }),
            (sender, receiver, amount) => {
                let missing = TransactionRequest {
                    sender,
                    receiver,
                    amount,
                }
                .missing_fields();
                Err(ChainError::InvalidTransaction(format!(
                    "Some elements of the transaction are missing: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}
