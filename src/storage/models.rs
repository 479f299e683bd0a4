//! Data models for BRIT storage

use chrono::{DateTime, Utc};

use crate::codec::{format_optional_date, parse_optional_date};
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

/// When a wallet was first seen by the Matcher, and when it first transacted
///
/// Stored as a single line:
///
/// ```text
/// <hex wallet id> <encounter millis|not-present> <first tx millis|not-present>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletToEncounterDateLink {
    pub wallet_id: BritWalletId,
    pub encounter_date: Option<DateTime<Utc>>,
    pub first_transaction_date: Option<DateTime<Utc>>,
}

impl WalletToEncounterDateLink {
    pub fn new(
        wallet_id: BritWalletId,
        encounter_date: Option<DateTime<Utc>>,
        first_transaction_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            wallet_id,
            encounter_date,
            first_transaction_date,
        }
    }

    pub fn serialize(&self) -> String {
        format!(
            "{} {} {}",
            self.wallet_id.to_hex(),
            format_optional_date(self.encounter_date.as_ref()),
            format_optional_date(self.first_transaction_date.as_ref())
        )
    }

    /// Parse one stored line
    ///
    /// # Errors
    /// `MatcherStore` unless exactly three space-separated fields are present and each
    /// one is well formed.
    pub fn parse(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(BritError::matcher_store(format!(
                "expected 3 fields, got {}",
                fields.len()
            )));
        }

        let wallet_id = BritWalletId::from_hex(fields[0])
            .map_err(|e| BritError::matcher_store(e.to_string()))?;
        let encounter_date = parse_optional_date(fields[1]).map_err(BritError::matcher_store)?;
        let first_transaction_date =
            parse_optional_date(fields[2]).map_err(BritError::matcher_store)?;

        Ok(Self {
            wallet_id,
            encounter_date,
            first_transaction_date,
        })
    }
}
