use crate::allocation::{
    FractionAllocationRecord, FractionAllocationRequest, FractionAllocator, FractionIndex,
};
use crate::error::RegistryError;
use crate::id::{Identity, LedgerId, ShareClassId, TokenId};
use crate::ledger::{MultiAssetLedger, UniqueAssetLedger};
use crate::roles::{AccessRegistry, Role};
use crate::storage::RegistrySnapshot;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

// Seeds for the keyless identity the registry presents to external ledgers
const REGISTRY_IDENTITY_SEED: &[u8] = b"land_registry/minter";

/// Journal entry recorded by every committed mutating operation
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    RoleGranted {
        role: Role,
        identity: Identity,
        at: DateTime<Utc>,
    },
    RoleRevoked {
        role: Role,
        identity: Identity,
        at: DateTime<Utc>,
    },
    LandLedgerRegistered {
        ledger: LedgerId,
        at: DateTime<Utc>,
    },
    ShareLedgerRegistered {
        ledger: LedgerId,
        at: DateTime<Utc>,
    },
    LandTokenMinted {
        ledger: LedgerId,
        token_id: TokenId,
        holder: Identity,
        at: DateTime<Utc>,
    },
    FractionsAllocated {
        land_ledger: LedgerId,
        land_token_id: TokenId,
        fraction_ledger: LedgerId,
        digest: [u8; 32],
        at: DateTime<Utc>,
    },
}

/// Sequential issuance bookkeeping for land tokens.
/// The count advances only when the delegated mint succeeds, so a failed
/// ledger call never consumes an identifier.
#[derive(Debug, Clone, Default)]
struct LandTokenIssuer {
    issued: u64,
}

impl LandTokenIssuer {
    fn with_issued(issued: u64) -> Self {
        Self { issued }
    }

    fn mint(
        &mut self,
        ledger: &dyn UniqueAssetLedger,
        minter: &Identity,
        recipient: &Identity,
    ) -> Result<TokenId, RegistryError> {
        let token = ledger.mint(minter, recipient)?;
        self.issued += 1;
        Ok(token)
    }
}

/// The public-facing orchestrator: role-gated land token issuance and
/// fractionalization over external asset ledgers, with dual-keyed
/// allocation lookups.
///
/// Every mutating operation is a single indivisible transition; mutating
/// methods take `&mut self`, so two in-flight mutations cannot interleave.
pub struct LandRegistry {
    identity: Identity,
    roles: AccessRegistry,
    issuer: LandTokenIssuer,
    index: FractionIndex,
    land_ledgers: HashMap<LedgerId, Arc<dyn UniqueAssetLedger>>,
    share_ledgers: HashMap<LedgerId, Arc<dyn MultiAssetLedger>>,
    events: Vec<RegistryEvent>,
}

impl std::fmt::Debug for LandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LandRegistry")
            .field("identity", &self.identity)
            .field("roles", &self.roles)
            .field("issuer", &self.issuer)
            .field("index", &self.index)
            .field("land_ledgers", &self.land_ledgers.keys().collect::<Vec<_>>())
            .field("share_ledgers", &self.share_ledgers.keys().collect::<Vec<_>>())
            .field("events", &self.events)
            .finish()
    }
}

impl LandRegistry {
    /// Create a registry with `initial_owner` holding OWNER
    pub fn new(initial_owner: Identity) -> Self {
        let identity = Identity::derive(&[REGISTRY_IDENTITY_SEED]);
        let mut roles = AccessRegistry::new();
        roles.grant(Role::Owner, initial_owner);
        // The registry holds MINTER against the ledgers it drives
        roles.grant(Role::Minter, identity);

        Self {
            identity,
            roles,
            issuer: LandTokenIssuer::default(),
            index: FractionIndex::new(),
            land_ledgers: HashMap::new(),
            share_ledgers: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// The keyless identity the registry presents to external ledgers.
    /// Ledgers must enroll it as a minter before issuance can succeed.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Grant `role` to `identity`. Caller must hold OWNER.
    pub fn grant_role(
        &mut self,
        caller: &Identity,
        role: Role,
        identity: Identity,
    ) -> Result<(), RegistryError> {
        self.roles.require_role(Role::Owner, caller)?;
        self.roles.grant(role, identity);
        info!("role {} granted to {}", role, identity);
        self.events.push(RegistryEvent::RoleGranted {
            role,
            identity,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Revoke `role` from `identity`. Caller must hold OWNER; revoking the
    /// last OWNER is rejected.
    pub fn revoke_role(
        &mut self,
        caller: &Identity,
        role: Role,
        identity: &Identity,
    ) -> Result<(), RegistryError> {
        self.roles.require_role(Role::Owner, caller)?;
        self.roles.revoke(role, identity)?;
        info!("role {} revoked from {}", role, identity);
        self.events.push(RegistryEvent::RoleRevoked {
            role,
            identity: *identity,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Pure membership query, never fails
    pub fn has_role(&self, role: Role, identity: &Identity) -> bool {
        self.roles.has_role(role, identity)
    }

    /// Enroll a unique-asset ledger handle. Caller must hold OWNER.
    pub fn register_land_ledger(
        &mut self,
        caller: &Identity,
        ledger: Arc<dyn UniqueAssetLedger>,
    ) -> Result<(), RegistryError> {
        self.roles.require_role(Role::Owner, caller)?;
        let id = ledger.ledger_id();
        self.land_ledgers.insert(id, ledger);
        debug!("land ledger {} registered", id);
        self.events.push(RegistryEvent::LandLedgerRegistered {
            ledger: id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Enroll a multi-quantity share ledger handle. Caller must hold OWNER.
    pub fn register_share_ledger(
        &mut self,
        caller: &Identity,
        ledger: Arc<dyn MultiAssetLedger>,
    ) -> Result<(), RegistryError> {
        self.roles.require_role(Role::Owner, caller)?;
        let id = ledger.ledger_id();
        self.share_ledgers.insert(id, ledger);
        debug!("share ledger {} registered", id);
        self.events.push(RegistryEvent::ShareLedgerRegistered {
            ledger: id,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Mint a new land token to the caller on the given ledger.
    /// Caller must hold AAA.
    pub fn mint_land_token(
        &mut self,
        caller: &Identity,
        ledger: &LedgerId,
    ) -> Result<TokenId, RegistryError> {
        self.roles.require_role(Role::Aaa, caller)?;
        let handle = self
            .land_ledgers
            .get(ledger)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("unknown land ledger {}", ledger)))?;

        let token = self.issuer.mint(handle.as_ref(), &self.identity, caller)?;
        info!("land token {} minted to {} on ledger {}", token, caller, ledger);
        self.events.push(RegistryEvent::LandTokenMinted {
            ledger: *ledger,
            token_id: token,
            holder: *caller,
            at: Utc::now(),
        });
        Ok(token)
    }

    /// Decompose a land token into fungible ownership shares.
    ///
    /// The caller must hold the land token or be approved to act on it;
    /// the whole operation commits or leaves no trace (see
    /// [`FractionAllocator`]).
    pub fn mint_fraction_token(
        &mut self,
        caller: &Identity,
        request: &FractionAllocationRequest,
    ) -> Result<FractionAllocationRecord, RegistryError> {
        let land = self
            .land_ledgers
            .get(&request.land_ledger)
            .cloned()
            .ok_or_else(|| {
                RegistryError::NotFound(format!("unknown land ledger {}", request.land_ledger))
            })?;
        let shares = self
            .share_ledgers
            .get(&request.fraction_ledger)
            .cloned()
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "unknown share ledger {}",
                    request.fraction_ledger
                ))
            })?;

        let record = FractionAllocator::allocate(
            caller,
            &self.identity,
            request,
            land.as_ref(),
            shares.as_ref(),
            &mut self.index,
        )?;

        info!(
            "land token {} on ledger {} fractionalized into {} share(s)",
            record.land_token_id, record.land_ledger, record.total_fractions
        );
        self.events.push(RegistryEvent::FractionsAllocated {
            land_ledger: record.land_ledger,
            land_token_id: record.land_token_id,
            fraction_ledger: record.fraction_ledger,
            digest: record.digest,
            at: Utc::now(),
        });
        Ok(record)
    }

    /// Public read: the allocation record for a land token
    pub fn fraction_info_by_land_token(
        &self,
        ledger: &LedgerId,
        token: TokenId,
    ) -> Result<&FractionAllocationRecord, RegistryError> {
        self.index
            .lookup_by_land_token(ledger, token)
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "no allocation for land token {} on ledger {}",
                    token, ledger
                ))
            })
    }

    /// Public read: the allocation record backing a share class
    pub fn fraction_info_by_fraction_token(
        &self,
        ledger: &LedgerId,
        share: ShareClassId,
    ) -> Result<&FractionAllocationRecord, RegistryError> {
        self.index
            .lookup_by_fraction_token(ledger, share)
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "no allocation backed by share class {} on ledger {}",
                    share, ledger
                ))
            })
    }

    /// Number of land tokens issued through this registry
    pub fn issued_land_tokens(&self) -> u64 {
        self.issuer.issued
    }

    /// Journal of committed mutating operations, oldest first
    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    /// Capture the durable state: role membership, issuance count and
    /// allocation records. The dual-keyed index is derived state and is
    /// rebuilt on restore.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            roles: self.roles.clone(),
            issued_tokens: self.issuer.issued,
            records: self.index.records().to_vec(),
        }
    }

    /// Rebuild a registry from a snapshot, revalidating every invariant.
    /// Ledger handles are process-local and must be re-registered by the
    /// host after restoring.
    pub fn restore(snapshot: RegistrySnapshot) -> Result<Self, RegistryError> {
        if snapshot.roles.holder_count(Role::Owner) == 0 {
            return Err(RegistryError::InvariantViolation(
                "snapshot has no OWNER holder".to_string(),
            ));
        }
        let index = FractionIndex::rebuild(snapshot.records)?;

        Ok(Self {
            identity: Identity::derive(&[REGISTRY_IDENTITY_SEED]),
            roles: snapshot.roles,
            issuer: LandTokenIssuer::with_issued(snapshot.issued_tokens),
            index,
            land_ledgers: HashMap::new(),
            share_ledgers: HashMap::new(),
            events: Vec::new(),
        })
    }
}
