pub mod allocation;
pub mod error;
pub mod id;
pub mod ledger;
pub mod registry;
pub mod roles;
pub mod storage;

// Re-export the main types for convenience
pub use allocation::{FractionAllocationRecord, FractionAllocationRequest, FractionIndex};
pub use error::{LedgerError, RegistryError};
pub use id::{Identity, LedgerId, ShareClassId, TokenId};
pub use ledger::{
    InMemoryAssetLedger, InMemoryShareLedger, MultiAssetLedger, UniqueAssetLedger,
};
pub use registry::{LandRegistry, RegistryEvent};
pub use roles::{AccessRegistry, Role};
pub use storage::{FileSnapshotStore, RegistrySnapshot, SnapshotStore};
