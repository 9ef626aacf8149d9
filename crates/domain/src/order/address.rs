//! Addresses, contact details and payment methods attached to an order.

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Address {
    /// Checks that every required field is non-blank. `label` names the
    /// address in the error ("shipping", "billing").
    pub fn validate(&self, label: &'static str) -> Result<(), ValidationError> {
        let required = [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingAddressField {
                    address: label,
                    field,
                });
            }
        }
        Ok(())
    }
}

/// How to reach the customer about this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Contact {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(ValidationError::InvalidEmail(self.email.clone())),
        }
    }
}

/// Payment method chosen at checkout. The gateway exchange is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Wallet => "WALLET",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH_ON_DELIVERY" => Ok(PaymentMethod::CashOnDelivery),
            "CARD" => Ok(PaymentMethod::Card),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "WALLET" => Ok(PaymentMethod::Wallet),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address {
            full_name: "Ada Lovelace".to_string(),
            line1: "12 Analytical Way".to_string(),
            line2: None,
            city: "London".to_string(),
            state: None,
            postal_code: "NW1".to_string(),
            country: "GB".to_string(),
            phone: None,
        }
    }

    #[test]
    fn test_valid_address() {
        assert!(address().validate("shipping").is_ok());
    }

    #[test]
    fn test_blank_field_is_reported() {
        let mut addr = address();
        addr.city = "   ".to_string();
        assert_eq!(
            addr.validate("billing"),
            Err(ValidationError::MissingAddressField {
                address: "billing",
                field: "city"
            })
        );
    }

    #[test]
    fn test_contact_email() {
        let mut contact = Contact {
            email: "ada@example.com".to_string(),
            phone: None,
        };
        assert!(contact.validate().is_ok());

        contact.email = "ada.example.com".to_string();
        assert!(matches!(
            contact.validate(),
            Err(ValidationError::InvalidEmail(_))
        ));

        contact.email = "@example.com".to_string();
        assert!(contact.validate().is_err());
    }

    #[test]
    fn test_payment_method_strings() {
        assert_eq!(
            "CASH_ON_DELIVERY".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CashOnDelivery
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"BANK_TRANSFER\""
        );
    }
}
