//! Bundled fallback fee addresses
//!
//! Used only while the Matcher cannot be reached. The list is derived from a
//! single recipient public key `P` shipped with the client:
//!
//! ```text
//! t_i = SHA-256("brit/hardwired" || P || i as u32 BE) mod n
//! P_i = P + t_i · G
//! address_i = P2PKH(P_i) on the wallet's network
//! ```
//!
//! The recipient spends from `address_i` with `p + t_i`. Because the encoding
//! follows the wallet's network, the same key serves mainnet, testnet, signet and
//! regtest wallets.
//!
//! **Placeholder.** `HARDWIRED_RECIPIENT_KEY` is currently the BIP-341
//! "nothing up my sleeve" point `H`, whose private key is unknown: fees sent to
//! it are unspendable. Replace it with the fee recipient's key before release and
//! bump `HARDWIRED_ADDRESSES_VERSION`.

use bitcoin::{Address, CompressedPublicKey, Network};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::crypto::reduce_mod_order;
use crate::wallet_id::BritWalletId;
use crate::{BritError, Result};

pub const HARDWIRED_ADDRESSES_VERSION: u32 = 2;

/// Compressed recipient public key (placeholder, see module docs)
pub const HARDWIRED_RECIPIENT_KEY: &str =
    "0250929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

/// Number of addresses derived from the recipient key
pub const HARDWIRED_ADDRESS_COUNT: u32 = 8;

const DOMAIN_TAG: &[u8] = b"brit/hardwired";

/// Index into a list of `len` entries chosen by hashing the wallet id
///
/// Spreads wallets evenly across the list while keeping each wallet's choice stable.
pub fn wallet_index(wallet_id: &BritWalletId, len: usize) -> usize {
    debug_assert!(len > 0);
    let digest = Sha256::digest(wallet_id.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % len as u64) as usize
}

fn recipient_key() -> Result<PublicKey> {
    let bytes = hex::decode(HARDWIRED_RECIPIENT_KEY)
        .map_err(|e| BritError::invalid_input(format!("hardwired recipient key hex: {}", e)))?;
    PublicKey::from_slice(&bytes)
        .map_err(|e| BritError::invalid_input(format!("hardwired recipient key: {}", e)))
}

/// The fallback list for `network`, in derivation order
pub fn hardwired_addresses(network: Network) -> Result<Vec<String>> {
    derive_addresses(&recipient_key()?, network)
}

fn tweak(recipient: &PublicKey, index: u32) -> Result<SecretKey> {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);
    hasher.update(recipient.serialize());
    hasher.update(index.to_be_bytes());
    reduce_mod_order(&hasher.finalize())
}

fn derive_addresses(recipient: &PublicKey, network: Network) -> Result<Vec<String>> {
    let secp = Secp256k1::new();
    (0..HARDWIRED_ADDRESS_COUNT)
        .map(|i| {
            let child = recipient
                .combine(&PublicKey::from_secret_key(&secp, &tweak(recipient, i)?))
                .map_err(|e| BritError::invalid_input(format!("hardwired key {}: {}", i, e)))?;
            Ok(Address::p2pkh(CompressedPublicKey(child), network).to_string())
        })
        .collect()
}

/// The hardwired address assigned to `wallet_id` on `network`
pub fn select_hardwired_address(wallet_id: &BritWalletId, network: Network) -> Result<String> {
    let mut addresses = hardwired_addresses(network)?;
    let index = wallet_index(wallet_id, addresses.len());
    Ok(addresses.swap_remove(index))
}
