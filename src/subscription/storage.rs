use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::subscription::config::{data_dir, ACCOUNTS_FILE};
use crate::subscription::types::{AccountError, BlockState, TrainerAccount};

/// Account persistence used by the lifecycle manager
pub trait AccountStore: Send {
    fn load(&self, id: Uuid) -> Result<Option<TrainerAccount>, AccountError>;

    fn find_by_username(&self, username: &str) -> Result<Option<TrainerAccount>, AccountError>;

    fn list(&self) -> Result<Vec<TrainerAccount>, AccountError>;

    /// Fails with `AlreadyExists` on a taken username or email
    fn insert(&mut self, account: TrainerAccount) -> Result<(), AccountError>;

    fn save(&mut self, account: &TrainerAccount) -> Result<(), AccountError>;

    /// Writes only the three block fields
    fn update_block_state(&mut self, id: Uuid, state: &BlockState) -> Result<(), AccountError>;
}

/// In-memory store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    accounts: BTreeMap<Uuid, TrainerAccount>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryStore {
    fn load(&self, id: Uuid) -> Result<Option<TrainerAccount>, AccountError> {
        Ok(self.accounts.get(&id).cloned())
    }

    fn find_by_username(&self, username: &str) -> Result<Option<TrainerAccount>, AccountError> {
        Ok(self.accounts.values().find(|a| a.username == username).cloned())
    }

    fn list(&self) -> Result<Vec<TrainerAccount>, AccountError> {
        Ok(self.accounts.values().cloned().collect())
    }

    fn insert(&mut self, account: TrainerAccount) -> Result<(), AccountError> {
        if let Some(existing) = self
            .accounts
            .values()
            .find(|a| a.username == account.username || a.email == account.email)
        {
            let taken = if existing.username == account.username {
                account.username
            } else {
                account.email
            };
            return Err(AccountError::AlreadyExists(taken));
        }
        self.accounts.insert(account.id, account);
        Ok(())
    }

    fn save(&mut self, account: &TrainerAccount) -> Result<(), AccountError> {
        let slot = self
            .accounts
            .get_mut(&account.id)
            .ok_or(AccountError::NotFound(account.id))?;
        *slot = account.clone();
        Ok(())
    }

    fn update_block_state(&mut self, id: Uuid, state: &BlockState) -> Result<(), AccountError> {
        let account = self.accounts.get_mut(&id).ok_or(AccountError::NotFound(id))?;
        account.apply_block_state(state.clone());
        Ok(())
    }
}

/// Accounts kept in one JSON file, cached in memory.
///
/// Every write rewrites the whole file; the cache only changes once the
/// file write succeeds.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: MemoryStore,
}

impl JsonFileStore {
    /// Opens the store under the configured data directory
    pub fn open_default() -> Result<Self, AccountError> {
        let dir = data_dir()
            .ok_or_else(|| AccountError::Storage("Failed to resolve data dir".to_string()))?;
        Self::open(dir.join(ACCOUNTS_FILE))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, AccountError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AccountError::Storage(format!("Failed to create data dir: {}", e)))?;
        }

        let mut cache = MemoryStore::new();
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| AccountError::Storage(format!("Failed to read accounts: {}", e)))?;

            let accounts: Vec<TrainerAccount> = serde_json::from_str(&contents)
                .map_err(|e| AccountError::Storage(format!("Failed to parse accounts: {}", e)))?;

            for account in accounts {
                cache.accounts.insert(account.id, account);
            }
        }

        tracing::debug!(
            path = %path.display(),
            accounts = cache.accounts.len(),
            "Opened account store"
        );
        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the cache, write it out, then keep it
    fn commit<F>(&mut self, change: F) -> Result<(), AccountError>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(), AccountError>,
    {
        let mut candidate = self.cache.clone();
        change(&mut candidate)?;
        Self::flush(&self.path, &candidate)?;
        self.cache = candidate;
        Ok(())
    }

    fn flush(path: &Path, store: &MemoryStore) -> Result<(), AccountError> {
        let accounts: Vec<&TrainerAccount> = store.accounts.values().collect();

        let json = serde_json::to_string_pretty(&accounts)
            .map_err(|e| AccountError::Storage(format!("Failed to serialize accounts: {}", e)))?;

        std::fs::write(path, json)
            .map_err(|e| AccountError::Storage(format!("Failed to write accounts: {}", e)))
    }
}

impl AccountStore for JsonFileStore {
    fn load(&self, id: Uuid) -> Result<Option<TrainerAccount>, AccountError> {
        self.cache.load(id)
    }

    fn find_by_username(&self, username: &str) -> Result<Option<TrainerAccount>, AccountError> {
        self.cache.find_by_username(username)
    }

    fn list(&self) -> Result<Vec<TrainerAccount>, AccountError> {
        self.cache.list()
    }

    fn insert(&mut self, account: TrainerAccount) -> Result<(), AccountError> {
        self.commit(|store| store.insert(account))
    }

    fn save(&mut self, account: &TrainerAccount) -> Result<(), AccountError> {
        self.commit(|store| store.save(account))
    }

    fn update_block_state(&mut self, id: Uuid, state: &BlockState) -> Result<(), AccountError> {
        self.commit(|store| store.update_block_state(id, state))
    }
}
