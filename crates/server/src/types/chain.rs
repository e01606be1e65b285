//! Chain and big-transaction action enums with their wire spellings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Blockchain network served by the index. Only Base is modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Base,
}

impl Chain {
    /// Parse the wire token (`"base"`).
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "base" => Ok(Self::Base),
            other => Err(AppError::UnknownChain(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a big transaction.
///
/// `All` is only meaningful as a query filter and never stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    All,
    Deposit,
    Withdraw,
    Buying,
    Selling,
}

impl Action {
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "all" => Ok(Self::All),
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "buying" => Ok(Self::Buying),
            "selling" => Ok(Self::Selling),
            other => Err(AppError::UnknownAction(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Buying => "buying",
            Self::Selling => "selling",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_parse_round_trip() {
        assert_eq!(Chain::parse("base").unwrap(), Chain::Base);
        assert_eq!(Chain::Base.to_string(), "base");
        assert!(matches!(
            Chain::parse("solana"),
            Err(AppError::UnknownChain(_))
        ));
    }

    #[test]
    fn action_parse_round_trip() {
        for (s, action) in [
            ("all", Action::All),
            ("deposit", Action::Deposit),
            ("withdraw", Action::Withdraw),
            ("buying", Action::Buying),
            ("selling", Action::Selling),
        ] {
            assert_eq!(Action::parse(s).unwrap(), action);
            assert_eq!(action.as_str(), s);
        }
        assert!(matches!(
            Action::parse("minting"),
            Err(AppError::UnknownAction(_))
        ));
    }

    #[test]
    fn action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Action::Selling).unwrap(),
            "\"selling\""
        );
    }
}
