use std::fs;
use std::path::{Path, PathBuf};

use secp256k1::rand::{thread_rng, RngCore};

use super::encounter::EncounterDateStore;
use super::models::WalletToEncounterDateLink;
use crate::config::BritConfig;
use crate::error::StorageError;
use crate::fee::FeeState;
use crate::wallet_id::BritWalletId;
use crate::Result;

const FEE_STATE_DIR: &str = "fee_state";
const ENCOUNTERS_DIR: &str = "encounters";

/// Wallet-local BRIT state on disk
///
/// ```text
/// <base>/fee_state/<hex wallet id>.json
/// <base>/encounters/<hex wallet id>.txt
/// ```
#[derive(Clone, Debug)]
pub struct Storage {
    base_path: PathBuf,
}

impl Storage {
    /// Create a new storage instance with the default base directory ("./brit")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./brit"),
        }
    }

    /// Create storage with custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Storage rooted at the configured data directory
    pub fn from_config(config: &BritConfig) -> Self {
        Self::new_with_base_dir(config.data_dir.clone())
    }

    /// Get the base directory path for BRIT storage
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    fn fee_state_path(&self, wallet_id: &BritWalletId) -> PathBuf {
        self.base_path
            .join(FEE_STATE_DIR)
            .join(format!("{}.json", wallet_id.to_hex()))
    }

    fn encounter_path(&self, wallet_id: &BritWalletId) -> PathBuf {
        self.base_path
            .join(ENCOUNTERS_DIR)
            .join(format!("{}.txt", wallet_id.to_hex()))
    }

    /// Save fee state to disk
    pub fn save_fee_state(
        &self,
        wallet_id: &BritWalletId,
        state: &FeeState,
    ) -> std::result::Result<(), StorageError> {
        let path = self.fee_state_path(wallet_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(state)?;
        write_replacing(&path, json.as_bytes())?;
        log::debug!("Saved fee state for wallet {}", wallet_id);
        Ok(())
    }

    /// Load fee state from disk, or `None` if the wallet has none yet
    pub fn load_fee_state(
        &self,
        wallet_id: &BritWalletId,
    ) -> std::result::Result<Option<FeeState>, StorageError> {
        let path = self.fee_state_path(wallet_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let state = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    /// Delete a wallet's fee state, if any
    pub fn delete_fee_state(&self, wallet_id: &BritWalletId) -> std::result::Result<(), StorageError> {
        let path = self.fee_state_path(wallet_id);
        if path.exists() {
            log::warn!("Deleting fee state: {:?}", path);
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl EncounterDateStore for Storage {
    fn load(&self, wallet_id: &BritWalletId) -> Result<Option<WalletToEncounterDateLink>> {
        let path = self.encounter_path(wallet_id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(StorageError::from)?;
        let link = WalletToEncounterDateLink::parse(contents.trim())?;
        Ok(Some(link))
    }

    fn save(&self, link: &WalletToEncounterDateLink) -> Result<()> {
        let path = self.encounter_path(&link.wallet_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        write_replacing(&path, format!("{}\n", link.serialize()).as_bytes())
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn insert_if_absent(&self, link: &WalletToEncounterDateLink) -> Result<bool> {
        let path = self.encounter_path(&link.wallet_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StorageError::from)?;
        }
        let created = write_new(&path, format!("{}\n", link.serialize()).as_bytes())
            .map_err(StorageError::from)?;
        if created {
            log::debug!("Recorded first encounter for wallet {}", link.wallet_id);
        }
        Ok(created)
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    path.with_extension(format!("{:016x}.tmp", thread_rng().next_u64()))
}

/// Write to a sibling temp file, then rename over the target
fn write_replacing(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = temp_sibling(path);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// Write to a sibling temp file, then hard-link it into place
///
/// Returns `false` without touching `path` if it already exists. The link either
/// succeeds with complete contents or fails, so readers never see a partial file.
fn write_new(path: &Path, contents: &[u8]) -> std::io::Result<bool> {
    let tmp = temp_sibling(path);
    fs::write(&tmp, contents)?;
    let linked = match fs::hard_link(&tmp, path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    };
    fs::remove_file(&tmp)?;
    linked
}
