//! Matcher → Payer response
//!
//! Newline-delimited text, encrypted under the session key the Payer sent:
//!
//! ```text
//! 1                                   version (must be 1)
//! 1400000000000 | not-present         replay date, epoch millis
//! 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa  one fee address per line, any order
//! ...
//! ```
//!
//! Address lines that fail validation for the expected network are logged and
//! skipped; the rest of the response is still accepted.

use std::collections::BTreeSet;
use std::str::FromStr;

use bitcoin::{Address, Network};
use chrono::{DateTime, Utc};
use zeroize::Zeroizing;

use crate::codec::{format_optional_date, parse_optional_date};
use crate::crypto::{self, SESSION_KEY_LEN};
use crate::{BritError, Result};

/// Only supported response version
pub const MATCHER_RESPONSE_VERSION: u32 = 1;

/// Fee addresses and optional replay date supplied by the Matcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatcherResponse {
    replay_date: Option<DateTime<Utc>>,
    addresses: BTreeSet<String>,
}

impl MatcherResponse {
    pub fn new<I, S>(replay_date: Option<DateTime<Utc>>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replay_date,
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn version(&self) -> u32 {
        MATCHER_RESPONSE_VERSION
    }

    pub fn replay_date(&self) -> Option<&DateTime<Utc>> {
        self.replay_date.as_ref()
    }

    /// Fee addresses in sorted order
    pub fn addresses(&self) -> &BTreeSet<String> {
        &self.addresses
    }

    pub fn has_addresses(&self) -> bool {
        !self.addresses.is_empty()
    }

    pub fn serialize(&self) -> String {
        let mut text = format!(
            "{}\n{}\n",
            MATCHER_RESPONSE_VERSION,
            format_optional_date(self.replay_date.as_ref())
        );
        for address in &self.addresses {
            text.push_str(address);
            text.push('\n');
        }
        text
    }

    /// Parse the text form, validating addresses against `network`
    ///
    /// # Errors
    /// `MatcherResponse` if fewer than two rows are present, the version is not `1`,
    /// or the replay date row is malformed.
    pub fn parse(text: &str, network: Network) -> Result<Self> {
        let rows: Vec<&str> = text.lines().map(str::trim).collect();
        if rows.len() < 2 {
            return Err(BritError::matcher_response(format!(
                "expected at least 2 rows, got {}",
                rows.len()
            )));
        }
        if rows[0] != MATCHER_RESPONSE_VERSION.to_string() {
            return Err(BritError::matcher_response(format!(
                "unsupported version '{}'",
                rows[0]
            )));
        }

        let replay_date = parse_optional_date(rows[1]).map_err(BritError::matcher_response)?;

        let mut addresses = BTreeSet::new();
        for (line_number, row) in rows.iter().enumerate().skip(2) {
            match validate_address(row, network) {
                Ok(address) => {
                    addresses.insert(address);
                }
                Err(reason) => {
                    log::warn!(
                        "Skipping fee address on line {}: '{}' ({})",
                        line_number,
                        row,
                        reason
                    );
                }
            }
        }

        Ok(Self {
            replay_date,
            addresses,
        })
    }

    /// Serialize and encrypt under the Payer's session key
    pub fn encrypt(&self, session_key: &[u8; SESSION_KEY_LEN]) -> Result<EncryptedMatcherResponse> {
        let payload = crypto::seal_with_session_key(session_key, self.serialize().as_bytes())?;
        Ok(EncryptedMatcherResponse(payload))
    }
}

/// The row as written, once it parses as an address on `network`
///
/// Re-encoding would change case (bech32 may be sent upper-case), so the input is kept.
fn validate_address(row: &str, network: Network) -> std::result::Result<String, String> {
    Address::from_str(row)
        .map_err(|e| e.to_string())?
        .require_network(network)
        .map_err(|e| e.to_string())?;
    Ok(row.to_string())
}

/// Opaque ciphertext of a serialized `MatcherResponse`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedMatcherResponse(Vec<u8>);

impl EncryptedMatcherResponse {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decrypt with the session key and parse
    pub fn decrypt(
        &self,
        session_key: &[u8; SESSION_KEY_LEN],
        network: Network,
    ) -> Result<MatcherResponse> {
        let plaintext = Zeroizing::new(crypto::open_with_session_key(session_key, &self.0)?);
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| BritError::matcher_response("response is not UTF-8"))?;
        MatcherResponse::parse(text, network)
    }
}

impl From<Vec<u8>> for EncryptedMatcherResponse {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
