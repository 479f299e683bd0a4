//! Matcher key material
//!
//! Key files are small armored text files:
//!
//! ```text
//! -----BEGIN BRIT MATCHER PUBLIC KEY-----
//! 02a1b2...
//! -----END BRIT MATCHER PUBLIC KEY-----
//! ```
//!
//! Armor lines and blank lines are ignored on read; the payload is hex.

use std::fs;
use std::path::Path;

use secp256k1::rand::thread_rng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use zeroize::Zeroizing;

use crate::error::StorageError;
use crate::{BritError, Result};

const PUBLIC_LABEL: &str = "BRIT MATCHER PUBLIC KEY";
const SECRET_LABEL: &str = "BRIT MATCHER SECRET KEY";

/// The Matcher's public key as known to Payers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatcherPublicKey(PublicKey);

impl MatcherPublicKey {
    pub fn new(key: PublicKey) -> Self {
        Self(key)
    }

    pub fn inner(&self) -> &PublicKey {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| BritError::invalid_input(format!("public key hex: {}", e)))?;
        let key = PublicKey::from_slice(&bytes)
            .map_err(|e| BritError::invalid_input(format!("public key: {}", e)))?;
        Ok(Self(key))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize())
    }

    /// Read an armored public key file
    ///
    /// # Errors
    /// `KeyNotFound` if the file is missing or has no payload.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let payload = read_armored(path.as_ref())?;
        Self::from_hex(&payload)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_armored(path.as_ref(), PUBLIC_LABEL, &self.to_hex())
    }
}

/// The Matcher's key pair
pub struct MatcherKeyPair {
    secret: SecretKey,
    public: MatcherPublicKey,
}

impl MatcherKeyPair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut thread_rng());
        Self {
            secret,
            public: MatcherPublicKey(public),
        }
    }

    pub fn from_secret_key(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self {
            secret,
            public: MatcherPublicKey(public),
        }
    }

    pub fn public_key(&self) -> MatcherPublicKey {
        self.public
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// Read an armored secret key file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let payload = Zeroizing::new(read_armored(path.as_ref())?);
        let bytes = Zeroizing::new(
            hex::decode(payload.trim())
                .map_err(|e| BritError::invalid_input(format!("secret key hex: {}", e)))?,
        );
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| BritError::invalid_input(format!("secret key: {}", e)))?;
        Ok(Self::from_secret_key(secret))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let payload = Zeroizing::new(hex::encode(self.secret.secret_bytes()));
        write_armored(path.as_ref(), SECRET_LABEL, &payload)
    }
}

impl std::fmt::Debug for MatcherKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatcherKeyPair")
            .field("public", &self.public.to_hex())
            .finish_non_exhaustive()
    }
}

fn read_armored(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(BritError::KeyNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path).map_err(StorageError::from)?;

    let payload: String = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    if payload.is_empty() {
        return Err(BritError::KeyNotFound(format!(
            "{} contains no key",
            path.display()
        )));
    }
    Ok(payload)
}

fn write_armored(path: &Path, label: &str, payload: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(StorageError::from)?;
    }
    let contents = format!(
        "-----BEGIN {label}-----\n{payload}\n-----END {label}-----\n",
        label = label,
        payload = payload
    );
    fs::write(path, contents).map_err(StorageError::from)?;
    Ok(())
}
