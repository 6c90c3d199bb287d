use crate::error::RegistryError;
use crate::id::{Identity, LedgerId, ShareClassId, TokenId};
use crate::ledger::{MultiAssetLedger, UniqueAssetLedger};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Caller-supplied description of one fractionalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionAllocationRequest {
    /// Ledger holding the land token being decomposed
    pub land_ledger: LedgerId,

    /// The land token being decomposed
    pub land_token_id: TokenId,

    /// Identity expected to currently hold the land token
    pub land_token_holder: Identity,

    /// Multi-quantity ledger the ownership shares are minted into
    pub fraction_ledger: LedgerId,

    /// Declared total supply for this allocation
    pub total_fractions: u128,

    /// Identities receiving shares, one entry per allocation line
    pub recipients: Vec<Identity>,

    /// Share-class ids minted under this allocation.
    /// Exactly one id is accepted today; every recipient mints under it.
    pub share_ids: Vec<ShareClassId>,

    /// Share quantities, one per recipient
    pub amounts: Vec<u128>,
}

impl FractionAllocationRequest {
    /// Check the request's internal invariants
    pub fn validate(&self) -> Result<(), RegistryError> {
        let declared = self
            .amounts
            .iter()
            .try_fold(0u128, |acc, amount| acc.checked_add(*amount))
            .ok_or_else(|| {
                RegistryError::Validation("fraction amounts overflow".to_string())
            })?;
        if declared != self.total_fractions {
            return Err(RegistryError::Validation(format!(
                "fraction amounts sum to {} but {} were declared",
                declared, self.total_fractions
            )));
        }

        if self.recipients.is_empty() || self.amounts.is_empty() {
            return Err(RegistryError::Validation(
                "at least one recipient and amount is required".to_string(),
            ));
        }
        if self.recipients.len() != self.amounts.len() {
            return Err(RegistryError::Validation(format!(
                "{} recipients but {} amounts",
                self.recipients.len(),
                self.amounts.len()
            )));
        }

        if self.share_ids.is_empty() {
            return Err(RegistryError::Validation(
                "a share class id is required".to_string(),
            ));
        }
        if self.share_ids.len() > 1 {
            return Err(RegistryError::Validation(
                "multiple share classes per allocation are not supported".to_string(),
            ));
        }

        Ok(())
    }

    /// Digest of the canonical request payload
    pub fn digest(&self) -> Result<[u8; 32], RegistryError> {
        let encoded = bincode::serialize(self)?;
        Ok(*blake3::hash(&encoded).as_bytes())
    }
}

/// The persisted, immutable-once-written result of a successful allocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionAllocationRecord {
    /// Ledger holding the decomposed land token
    pub land_ledger: LedgerId,

    /// The decomposed land token
    pub land_token_id: TokenId,

    /// Holder of the land token at allocation time
    pub land_token_holder: Identity,

    /// Ledger the ownership shares were minted into
    pub fraction_ledger: LedgerId,

    /// Total share supply of this allocation
    pub total_fractions: u128,

    /// Identities the shares were minted to
    pub recipients: Vec<Identity>,

    /// Share-class ids minted under this allocation
    pub share_ids: Vec<ShareClassId>,

    /// Share quantities, one per recipient
    pub amounts: Vec<u128>,

    /// Digest of the canonical request payload this record was built from
    pub digest: [u8; 32],
}

/// Dual-keyed index over allocation records.
///
/// One record store with two derived key maps, both written by the same
/// internal insert. The two lookup paths can never disagree about a record
/// because there is only ever one record to disagree about.
#[derive(Debug, Clone, Default)]
pub struct FractionIndex {
    records: Vec<FractionAllocationRecord>,
    by_land_token: HashMap<(LedgerId, TokenId), usize>,
    by_fraction_token: HashMap<(LedgerId, ShareClassId), usize>,
}

impl FractionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record under both keys.
    /// Only the allocator writes here; callers go through the lookups.
    pub(crate) fn insert(&mut self, record: FractionAllocationRecord) -> Result<(), RegistryError> {
        let land_key = (record.land_ledger, record.land_token_id);
        if self.by_land_token.contains_key(&land_key) {
            return Err(RegistryError::Conflict(format!(
                "land token {} on ledger {} is already fractionalized",
                record.land_token_id, record.land_ledger
            )));
        }
        let share_keys: Vec<(LedgerId, ShareClassId)> = record
            .share_ids
            .iter()
            .map(|share| (record.fraction_ledger, *share))
            .collect();
        for (ledger, share) in &share_keys {
            if self.by_fraction_token.contains_key(&(*ledger, *share)) {
                return Err(RegistryError::Conflict(format!(
                    "share class {} on ledger {} already backs another allocation",
                    share, ledger
                )));
            }
        }

        let slot = self.records.len();
        self.records.push(record);
        self.by_land_token.insert(land_key, slot);
        for key in share_keys {
            self.by_fraction_token.insert(key, slot);
        }
        Ok(())
    }

    /// Allocation record for a land token, if one exists
    pub fn lookup_by_land_token(
        &self,
        ledger: &LedgerId,
        token: TokenId,
    ) -> Option<&FractionAllocationRecord> {
        self.by_land_token
            .get(&(*ledger, token))
            .map(|slot| &self.records[*slot])
    }

    /// Allocation record backing a share class, if one exists
    pub fn lookup_by_fraction_token(
        &self,
        ledger: &LedgerId,
        share: ShareClassId,
    ) -> Option<&FractionAllocationRecord> {
        self.by_fraction_token
            .get(&(*ledger, share))
            .map(|slot| &self.records[*slot])
    }

    /// Whether a land token already has an allocation record
    pub fn contains_land_token(&self, ledger: &LedgerId, token: TokenId) -> bool {
        self.by_land_token.contains_key(&(*ledger, token))
    }

    /// All records in insertion order
    pub fn records(&self) -> &[FractionAllocationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rebuild the index from persisted records, re-running every key
    /// uniqueness check. A record set that cannot be indexed consistently
    /// is rejected.
    pub(crate) fn rebuild(
        records: Vec<FractionAllocationRecord>,
    ) -> Result<Self, RegistryError> {
        let mut index = Self::new();
        for record in records {
            index.insert(record)?;
        }
        Ok(index)
    }
}

/// Validates and executes the decomposition of one land token into shares
pub struct FractionAllocator;

impl FractionAllocator {
    /// Run the full precondition chain and, if it passes, mint every share
    /// line and insert the allocation record under both index keys.
    ///
    /// Preconditions are checked in order; the first failure aborts with no
    /// effect. Share mints that already landed when a later mint fails are
    /// compensated with burns before the error is returned, and the index
    /// is written only after every mint has succeeded.
    pub(crate) fn allocate(
        caller: &Identity,
        registry_identity: &Identity,
        request: &FractionAllocationRequest,
        land_ledger: &dyn UniqueAssetLedger,
        share_ledger: &dyn MultiAssetLedger,
        index: &mut FractionIndex,
    ) -> Result<FractionAllocationRecord, RegistryError> {
        // 1. The caller must hold the land token or be approved to act on it
        let holder = land_ledger.owner_of(request.land_token_id)?;
        if holder != *caller && !land_ledger.is_approved(caller, request.land_token_id)? {
            return Err(RegistryError::Unauthorized(format!(
                "{} neither holds nor is approved for land token {}",
                caller, request.land_token_id
            )));
        }
        if holder != request.land_token_holder {
            return Err(RegistryError::Validation(format!(
                "declared holder {} does not match actual holder {}",
                request.land_token_holder, holder
            )));
        }

        // 2. + 3. Arithmetic and shape invariants
        request.validate()?;
        let share = request.share_ids[0];

        // 4. At most one allocation per land token; the share class must be fresh
        if index.contains_land_token(&request.land_ledger, request.land_token_id) {
            return Err(RegistryError::Conflict(format!(
                "land token {} on ledger {} is already fractionalized",
                request.land_token_id, request.land_ledger
            )));
        }
        if index
            .lookup_by_fraction_token(&request.fraction_ledger, share)
            .is_some()
        {
            return Err(RegistryError::Conflict(format!(
                "share class {} on ledger {} already backs another allocation",
                share, request.fraction_ledger
            )));
        }

        let digest = request.digest()?;

        // Stage the share mints; compensate everything already minted if a
        // later line fails, so a partial batch is never observable.
        let mut minted: Vec<(Identity, u128)> = Vec::with_capacity(request.recipients.len());
        for (recipient, amount) in request.recipients.iter().zip(&request.amounts) {
            if let Err(err) = share_ledger.mint_batch(registry_identity, recipient, share, *amount)
            {
                for (granted, granted_amount) in minted.iter().rev() {
                    if let Err(undo) = share_ledger.burn(granted, share, *granted_amount) {
                        warn!(
                            "compensating burn of {} share(s) from {} failed: {}",
                            granted_amount, granted, undo
                        );
                    }
                }
                return Err(err.into());
            }
            minted.push((*recipient, *amount));
        }

        let record = FractionAllocationRecord {
            land_ledger: request.land_ledger,
            land_token_id: request.land_token_id,
            land_token_holder: holder,
            fraction_ledger: request.fraction_ledger,
            total_fractions: request.total_fractions,
            recipients: request.recipients.clone(),
            share_ids: request.share_ids.clone(),
            amounts: request.amounts.clone(),
            digest,
        };
        index.insert(record.clone())?;
        Ok(record)
    }
}
