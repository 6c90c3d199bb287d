use crate::allocation::FractionAllocationRecord;
use crate::error::RegistryError;
use crate::roles::AccessRegistry;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Durable image of the registry.
///
/// Holds role membership, the land-token issuance count and every
/// allocation record. The dual-keyed index is derived state and is
/// rebuilt (and revalidated) when the snapshot is restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub roles: AccessRegistry,
    pub issued_tokens: u64,
    pub records: Vec<FractionAllocationRecord>,
}

/// Store for registry snapshots
pub trait SnapshotStore {
    /// Persist a snapshot, replacing any previous one
    ///
    /// # Parameters
    /// * `snapshot` - The snapshot to persist
    ///
    /// # Returns
    /// Ok(()) if successful, Err otherwise
    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError>;

    /// Load the most recently saved snapshot
    ///
    /// # Returns
    /// Some(snapshot) if one was saved before, None otherwise
    fn load(&self) -> Result<Option<RegistrySnapshot>, RegistryError>;
}

/// A basic file-backed snapshot store encoding with bincode
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store writing to the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);

        let serialized = bincode::serialize(snapshot)?;
        writer.write_all(&serialized)?;
        writer.flush()?;

        Ok(())
    }

    fn load(&self) -> Result<Option<RegistrySnapshot>, RegistryError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let snapshot = bincode::deserialize_from(reader)
            .map_err(|err| RegistryError::Serialization(err.to_string()))?;

        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Identity, LedgerId};
    use crate::registry::LandRegistry;
    use crate::roles::Role;
    use tempfile::tempdir;

    fn snapshot_with_owner() -> RegistrySnapshot {
        let registry = LandRegistry::new(Identity::new([1; 32]));
        registry.snapshot()
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("registry.snapshot"));

        let snapshot = snapshot_with_owner();
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.issued_tokens, snapshot.issued_tokens);
        assert_eq!(loaded.records, snapshot.records);
        assert!(loaded.roles.has_role(Role::Owner, &Identity::new([1; 32])));
    }

    #[test]
    fn test_load_without_prior_save() {
        let temp_dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("missing.snapshot"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let temp_dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("registry.snapshot"));

        let mut snapshot = snapshot_with_owner();
        store.save(&snapshot).unwrap();

        snapshot.issued_tokens = 5;
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.issued_tokens, 5);
    }

    #[test]
    fn test_restored_registry_answers_lookups() {
        let temp_dir = tempdir().unwrap();
        let store = FileSnapshotStore::new(temp_dir.path().join("registry.snapshot"));

        // Build a registry with one allocation and persist it
        let owner = Identity::new([1; 32]);
        let holder = Identity::new([2; 32]);
        let land_ledger = LedgerId::new([10; 32]);
        let share_ledger = LedgerId::new([20; 32]);

        let mut registry = LandRegistry::new(owner);
        let land = std::sync::Arc::new(crate::ledger::InMemoryAssetLedger::new(land_ledger));
        let shares = std::sync::Arc::new(crate::ledger::InMemoryShareLedger::new(share_ledger));
        land.add_minter(registry.identity());
        shares.add_minter(registry.identity());
        registry.register_land_ledger(&owner, land).unwrap();
        registry.register_share_ledger(&owner, shares).unwrap();
        registry.grant_role(&owner, Role::Aaa, holder).unwrap();

        let token = registry.mint_land_token(&holder, &land_ledger).unwrap();
        let request = crate::allocation::FractionAllocationRequest {
            land_ledger,
            land_token_id: token,
            land_token_holder: holder,
            fraction_ledger: share_ledger,
            total_fractions: 100,
            recipients: vec![Identity::new([3; 32]), Identity::new([4; 32])],
            share_ids: vec![0],
            amounts: vec![50, 50],
        };
        registry.mint_fraction_token(&holder, &request).unwrap();
        store.save(&registry.snapshot()).unwrap();

        // A fresh process loads the snapshot and serves the same lookups
        let loaded = store.load().unwrap().unwrap();
        let restored = LandRegistry::restore(loaded).unwrap();
        let record = restored
            .fraction_info_by_land_token(&land_ledger, token)
            .unwrap();
        assert_eq!(record.total_fractions, 100);
        assert_eq!(
            restored
                .fraction_info_by_fraction_token(&share_ledger, 0)
                .unwrap(),
            record
        );
    }
}
