//! Request model validated at the boundary.
//!
//! Payment and withdrawal details are tagged variants: each method carries
//! exactly the fields it needs, so "card payment without a card number"
//! cannot be expressed past deserialization. What remains is content
//! validation, done here before anything touches a store.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use spacehub_types::{CoreError, Money, PaymentMethod, Result, UserId};

pub use spacehub_booking::NewBooking as CreateBookingRequest;

/// Payment details for `capture_payment`, tagged by method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentDetails {
    Card {
        card_number: String,
        card_holder: String,
        /// `MM/YY`
        expiry: String,
    },
    EWallet {
        provider: String,
        phone_number: String,
    },
    PayAtProperty {
        #[serde(default)]
        note: Option<String>,
    },
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentDetails::Card { .. } => PaymentMethod::Card,
            PaymentDetails::EWallet { .. } => PaymentMethod::EWallet,
            PaymentDetails::PayAtProperty { .. } => PaymentMethod::PayAtProperty,
        }
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        match self {
            PaymentDetails::Card {
                card_number,
                card_holder,
                expiry,
            } => {
                let digits = digits_only(card_number).unwrap_or_default();
                if !(12..=19).contains(&digits.len()) || !luhn_valid(&digits) {
                    return Err(CoreError::validation("card_number", "invalid card number"));
                }
                if card_holder.trim().is_empty() {
                    return Err(CoreError::validation("card_holder", "required"));
                }
                validate_expiry(expiry, now)
            }
            PaymentDetails::EWallet {
                provider,
                phone_number,
            } => {
                if provider.trim().is_empty() {
                    return Err(CoreError::validation("provider", "required"));
                }
                validate_phone(phone_number)
            }
            PaymentDetails::PayAtProperty { .. } => Ok(()),
        }
    }
}

/// Where a withdrawal is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WithdrawalMethod {
    BankTransfer {
        bank_name: String,
        account_number: String,
        account_holder: String,
    },
    MobileWallet {
        provider: String,
        phone_number: String,
    },
}

impl WithdrawalMethod {
    pub fn kind(&self) -> &'static str {
        match self {
            WithdrawalMethod::BankTransfer { .. } => "bank_transfer",
            WithdrawalMethod::MobileWallet { .. } => "mobile_wallet",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            WithdrawalMethod::BankTransfer {
                bank_name,
                account_number,
                account_holder,
            } => {
                if bank_name.trim().is_empty() {
                    return Err(CoreError::validation("bank_name", "required"));
                }
                if account_holder.trim().is_empty() {
                    return Err(CoreError::validation("account_holder", "required"));
                }
                let digits = digits_only(account_number).unwrap_or_default();
                if !(6..=34).contains(&digits.len()) {
                    return Err(CoreError::validation(
                        "account_number",
                        "must have 6 to 34 digits",
                    ));
                }
                Ok(())
            }
            WithdrawalMethod::MobileWallet {
                provider,
                phone_number,
            } => {
                if provider.trim().is_empty() {
                    return Err(CoreError::validation("provider", "required"));
                }
                validate_phone(phone_number)
            }
        }
    }

    /// Destination with everything but the last four digits hidden.
    pub fn masked(&self) -> String {
        match self {
            WithdrawalMethod::BankTransfer {
                bank_name,
                account_number,
                ..
            } => format!("{bank_name} ****{}", last_four(account_number)),
            WithdrawalMethod::MobileWallet {
                provider,
                phone_number,
            } => format!("{provider} ****{}", last_four(phone_number)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub host_id: UserId,
    pub amount: Money,
    pub method: WithdrawalMethod,
}

impl WithdrawalRequest {
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_zero() {
            return Err(CoreError::validation("amount", "must be greater than zero"));
        }
        self.method.validate()
    }
}

/// `s` with spaces and dashes removed, or `None` if anything else is not a digit.
fn digits_only(s: &str) -> Option<String> {
    let digits: String = s.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    digits.chars().all(|c| c.is_ascii_digit()).then_some(digits)
}

fn last_four(s: &str) -> String {
    let digits: Vec<char> = s.chars().filter(char::is_ascii_digit).collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}

/// Luhn checksum over an all-digit string.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

fn validate_expiry(expiry: &str, now: DateTime<Utc>) -> Result<()> {
    let invalid = || CoreError::validation("expiry", "must be MM/YY");
    let (mm, yy) = expiry.trim().split_once('/').ok_or_else(invalid)?;
    if mm.len() != 2 || yy.len() != 2 {
        return Err(invalid());
    }
    let month: u32 = mm.parse().map_err(|_| invalid())?;
    let year: i32 = yy.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    // Valid through the last day of the expiry month
    if (2000 + year, month) < (now.year(), now.month()) {
        return Err(CoreError::validation("expiry", "card has expired"));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<()> {
    let trimmed = phone.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = digits_only(digits).unwrap_or_default();
    if !(7..=15).contains(&digits.len()) {
        return Err(CoreError::validation("phone_number", "must have 7 to 15 digits"));
    }
    Ok(())
}
