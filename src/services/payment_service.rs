use uuid::Uuid;

use crate::{
    audit,
    dto::payment::{PaymentReceipt, PaymentRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Upper bound accepted by the simulated gateway, in minor units.
pub const PAYMENT_LIMIT: i64 = 100_000;

/// Simulated card charge. Nothing leaves the process.
pub async fn process_payment(
    state: &AppState,
    user: &AuthUser,
    payload: PaymentRequest,
) -> AppResult<ApiResponse<PaymentReceipt>> {
    validate(&payload)?;

    let receipt = charge(&payload).ok_or_else(|| {
        tracing::info!(user_id = %user.user_id, amount = payload.amount, "payment declined");
        AppError::bad_request("Payment failed. Invalid card or amount exceeds limit")
    })?;

    tracing::info!(
        user_id = %user.user_id,
        amount = payload.amount,
        transaction_id = %receipt.transaction_id,
        "payment processed"
    );
    audit::record(
        state,
        Some(user.user_id),
        "payment_process",
        "payments",
        serde_json::json!({ "transaction_id": receipt.transaction_id, "amount": payload.amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment processed successfully",
        receipt,
        Some(Meta::empty()),
    ))
}

fn validate(payload: &PaymentRequest) -> AppResult<()> {
    if payload.amount <= 0 {
        return Err(AppError::bad_request("Amount should be greater than 0"));
    }
    if !is_digits(&payload.card_number, 16) {
        return Err(AppError::bad_request("Card number should be 16 digits"));
    }
    if !valid_expiry(&payload.expiry_date) {
        return Err(AppError::bad_request("Invalid expiry date format"));
    }
    if !is_digits(&payload.cvv, 3) {
        return Err(AppError::bad_request("CVV should be 3 digits"));
    }
    Ok(())
}

fn charge(payload: &PaymentRequest) -> Option<PaymentReceipt> {
    let accepted = payload.card_number.starts_with('4') && payload.amount <= PAYMENT_LIMIT;
    accepted.then(|| PaymentReceipt {
        transaction_id: format!("txn_{}", Uuid::new_v4().simple()),
        status: "success".to_string(),
    })
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

// MM/YY or MM/YYYY, slash optional.
fn valid_expiry(value: &str) -> bool {
    let (month, year) = match value.split_once('/') {
        Some(parts) => parts,
        None if value.len() >= 2 && value.is_char_boundary(2) => value.split_at(2),
        None => return false,
    };

    let month_ok = is_digits(month, 2) && matches!(month.parse::<u8>(), Ok(1..=12));
    let year_ok = is_digits(year, 2) || is_digits(year, 4);
    month_ok && year_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: i64, card: &str) -> PaymentRequest {
        PaymentRequest {
            amount,
            card_number: card.into(),
            expiry_date: "12/27".into(),
            cvv: "123".into(),
        }
    }

    #[test]
    fn expiry_formats() {
        for ok in ["01/25", "12/2030", "0925", "112031"] {
            assert!(valid_expiry(ok), "{ok} should be accepted");
        }
        for bad in ["13/25", "00/25", "1/25", "12/5", "12/205", "", "ab/cd", "12-25"] {
            assert!(!valid_expiry(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(validate(&request(0, "4111111111111111")).is_err());
        assert!(validate(&request(100, "411111111111111")).is_err());
        assert!(validate(&request(100, "41111111111111a1")).is_err());

        let mut req = request(100, "4111111111111111");
        req.cvv = "12".into();
        assert!(validate(&req).is_err());

        assert!(validate(&request(100, "4111111111111111")).is_ok());
    }

    #[test]
    fn visa_prefix_within_limit_succeeds() {
        let receipt = charge(&request(PAYMENT_LIMIT, "4111111111111111")).unwrap();
        assert_eq!(receipt.status, "success");
        assert!(receipt.transaction_id.starts_with("txn_"));
    }

    #[test]
    fn declines_other_cards_and_large_amounts() {
        assert!(charge(&request(100, "5111111111111111")).is_none());
        assert!(charge(&request(PAYMENT_LIMIT + 1, "4111111111111111")).is_none());
    }
}
