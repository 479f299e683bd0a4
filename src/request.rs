//! Payer → Matcher request
//!
//! Text form before encryption, one field per line:
//!
//! ```text
//! 1                      version
//! 8234...                wallet id, decimal big integer
//! 1157...                session key, decimal big integer
//! 1400000000000          first transaction date (epoch millis) or not-present
//! ```
//!
//! The text is encrypted to the Matcher's public key with the hybrid scheme in
//! [`crate::crypto`].

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use zeroize::Zeroizing;

use crate::codec::{format_optional_date, parse_optional_date};
use crate::crypto::{self, SESSION_KEY_LEN};
use crate::keys::{MatcherKeyPair, MatcherPublicKey};
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

/// Only supported request version
pub const PAYER_REQUEST_VERSION: u32 = 1;

/// A Payer's request for fee addresses
#[derive(Clone, PartialEq, Eq)]
pub struct PayerRequest {
    wallet_id: BritWalletId,
    session_key: Zeroizing<[u8; SESSION_KEY_LEN]>,
    first_transaction_date: Option<DateTime<Utc>>,
}

impl PayerRequest {
    /// Build a request with a fresh random session key
    pub fn new(wallet_id: BritWalletId, first_transaction_date: Option<DateTime<Utc>>) -> Self {
        Self {
            wallet_id,
            session_key: crypto::generate_session_key(),
            first_transaction_date,
        }
    }

    pub fn with_session_key(
        wallet_id: BritWalletId,
        session_key: [u8; SESSION_KEY_LEN],
        first_transaction_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            wallet_id,
            session_key: Zeroizing::new(session_key),
            first_transaction_date,
        }
    }

    pub fn version(&self) -> u32 {
        PAYER_REQUEST_VERSION
    }

    pub fn wallet_id(&self) -> &BritWalletId {
        &self.wallet_id
    }

    pub fn session_key(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.session_key
    }

    pub fn first_transaction_date(&self) -> Option<&DateTime<Utc>> {
        self.first_transaction_date.as_ref()
    }

    /// Text form (contains the session key; never log or persist it)
    pub fn serialize(&self) -> Zeroizing<String> {
        Zeroizing::new(format!(
            "{}\n{}\n{}\n{}\n",
            PAYER_REQUEST_VERSION,
            self.wallet_id.to_big_uint().to_str_radix(10),
            BigUint::from_bytes_be(&self.session_key[..]).to_str_radix(10),
            format_optional_date(self.first_transaction_date.as_ref())
        ))
    }

    /// Parse the text form
    ///
    /// # Errors
    /// `DecryptionFailure`: a plaintext that does not parse is as useless as one that
    /// did not decrypt.
    pub fn parse(text: &str) -> Result<Self> {
        let rows: Vec<&str> = text.lines().map(str::trim).collect();
        if rows.len() < 4 {
            return Err(malformed(format!("expected 4 rows, got {}", rows.len())));
        }
        if rows[0] != PAYER_REQUEST_VERSION.to_string() {
            return Err(malformed(format!("unsupported version '{}'", rows[0])));
        }

        let wallet_id = BritWalletId::from_big_uint(&parse_decimal(rows[1], "wallet id")?)
            .map_err(|e| malformed(e.to_string()))?;

        let session_value = parse_decimal(rows[2], "session key")?;
        let be = Zeroizing::new(session_value.to_bytes_be());
        if be.len() > SESSION_KEY_LEN {
            return Err(malformed("session key exceeds 256 bits"));
        }
        let mut session_key = Zeroizing::new([0u8; SESSION_KEY_LEN]);
        session_key[SESSION_KEY_LEN - be.len()..].copy_from_slice(&be);

        let first_transaction_date = parse_optional_date(rows[3]).map_err(malformed)?;

        Ok(Self {
            wallet_id,
            session_key,
            first_transaction_date,
        })
    }

    /// Serialize and encrypt to the Matcher's public key
    pub fn encrypt(&self, matcher_key: &MatcherPublicKey) -> Result<EncryptedPayerRequest> {
        let text = self.serialize();
        let payload = crypto::seal_to_public_key(matcher_key.inner(), text.as_bytes())?;
        log::debug!(
            "Encrypted payer request for wallet {} ({} bytes)",
            self.wallet_id,
            payload.len()
        );
        Ok(EncryptedPayerRequest(payload))
    }
}

impl std::fmt::Debug for PayerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayerRequest")
            .field("version", &PAYER_REQUEST_VERSION)
            .field("wallet_id", &self.wallet_id)
            .field("first_transaction_date", &self.first_transaction_date)
            .finish_non_exhaustive()
    }
}

fn malformed(msg: impl Into<String>) -> BritError {
    BritError::DecryptionFailure(format!("malformed payer request: {}", msg.into()))
}

fn parse_decimal(field: &str, what: &str) -> Result<BigUint> {
    BigUint::parse_bytes(field.as_bytes(), 10)
        .ok_or_else(|| malformed(format!("{} is not a decimal integer", what)))
}

/// Opaque ciphertext of a serialized `PayerRequest`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayerRequest(Vec<u8>);

impl EncryptedPayerRequest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Decrypt and parse with the Matcher's key pair
    pub fn decrypt(&self, key_pair: &MatcherKeyPair) -> Result<PayerRequest> {
        let plaintext = Zeroizing::new(crypto::open_with_secret_key(
            key_pair.secret_key(),
            &self.0,
        )?);
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| malformed("request is not UTF-8"))?;
        PayerRequest::parse(text)
    }
}

impl From<Vec<u8>> for EncryptedPayerRequest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
