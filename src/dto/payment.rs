use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// Minor units, e.g. `4999` for 49.99.
    #[schema(example = 4999)]
    pub amount: i64,
    #[serde(alias = "cardNumber")]
    pub card_number: String,
    #[serde(alias = "expiryDate")]
    pub expiry_date: String,
    pub cvv: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReceipt {
    pub transaction_id: String,
    pub status: String,
}
