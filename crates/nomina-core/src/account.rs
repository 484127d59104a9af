//! Bank account kinds.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Kind of a bank account. Payroll accounts are preferred when paying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Savings account ("Ahorro").
    Savings,
    /// Payroll account ("Nómina").
    Payroll,
}

impl AccountKind {
    /// Storage code: 1 = savings, 2 = payroll.
    pub fn code(self) -> i16 {
        match self {
            Self::Savings => 1,
            Self::Payroll => 2,
        }
    }

    /// Parse a storage code.
    pub fn from_code(code: i16) -> Result<Self, ValidationError> {
        match code {
            1 => Ok(Self::Savings),
            2 => Ok(Self::Payroll),
            other => Err(ValidationError::InvalidAccountKind(other)),
        }
    }

    /// Human-readable label shown on receipts.
    pub fn label(self) -> &'static str {
        match self {
            Self::Savings => "Ahorro",
            Self::Payroll => "Nómina",
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_roundtrip_and_unknown() {
        for kind in [AccountKind::Savings, AccountKind::Payroll] {
            assert_eq!(AccountKind::from_code(kind.code()).unwrap(), kind);
        }
        assert_eq!(
            AccountKind::from_code(7),
            Err(ValidationError::InvalidAccountKind(7))
        );
    }

    #[test]
    fn labels_and_wire_names() {
        assert_eq!(AccountKind::Payroll.label(), "Nómina");
        assert_eq!(
            serde_json::to_string(&AccountKind::Savings).unwrap(),
            "\"savings\""
        );
    }
}
