//! Matcher-side fee address generation
//!
//! Each index gets its own private key:
//!
//! ```text
//! k_i = HMAC-SHA512(key = generator seed, data = "brit/fee-address" || i as u32 BE)[..32] mod n
//! ```
//!
//! and the address is the P2PKH encoding of `k_i · G` (compressed) on the requested
//! network. Only the seed holder can recompute `k_i`; an address reveals neither the
//! seed nor any other index's address.

use bitcoin::{Address, CompressedPublicKey, Network};
use hmac::{Hmac, Mac};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::reduce_mod_order;
use crate::{BritError, Result};

const DOMAIN_TAG: &[u8] = b"brit/fee-address";

/// Deterministic address generator keyed by a secret seed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AddressGenerator {
    seed: Vec<u8>,
}

impl AddressGenerator {
    pub fn new(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(BritError::invalid_input("address generator seed is empty"));
        }
        Ok(Self {
            seed: seed.to_vec(),
        })
    }

    /// Private key for the fee address at `index`
    ///
    /// Kept to the Matcher so it can sweep fees paid to its addresses.
    pub fn private_key(&self, index: u32) -> Result<SecretKey> {
        let mut mac = Hmac::<Sha512>::new_from_slice(&self.seed)
            .map_err(|e| BritError::invalid_input(e.to_string()))?;
        mac.update(DOMAIN_TAG);
        mac.update(&index.to_be_bytes());
        let mut output = Zeroizing::new([0u8; 64]);
        output.copy_from_slice(&mac.finalize().into_bytes());

        reduce_mod_order(&output[..32])
    }

    /// Fee address at `index` on `network`
    pub fn create_address(&self, index: u32, network: Network) -> Result<Address> {
        let secret = self.private_key(index)?;
        let secp = Secp256k1::signing_only();
        let public = CompressedPublicKey(PublicKey::from_secret_key(&secp, &secret));

        Ok(Address::p2pkh(public, network))
    }

    /// Addresses for the contiguous range `start..start + count`
    pub fn create_addresses(
        &self,
        start: u32,
        count: u32,
        network: Network,
    ) -> Result<Vec<(u32, Address)>> {
        let mut addresses = Vec::with_capacity(count as usize);

        for i in 0..count {
            let index = start
                .checked_add(i)
                .ok_or_else(|| BritError::invalid_input("address index overflows u32"))?;
            addresses.push((index, self.create_address(index, network)?));
        }

        Ok(addresses)
    }
}

impl std::fmt::Debug for AddressGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AddressGenerator { seed: <redacted> }")
    }
}
