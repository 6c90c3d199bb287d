use crate::error::LedgerError;
use crate::id::{Identity, LedgerId, ShareClassId, TokenId};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Unique-asset ledger holding exactly one identity per token.
///
/// The registry drives this interface to issue land tokens; internal
/// bookkeeping (transfer, burn) is the ledger's own concern.
pub trait UniqueAssetLedger: Send + Sync {
    /// Opaque handle identifying this ledger instance
    fn ledger_id(&self) -> LedgerId;

    /// Mint the next sequential token to `to`
    ///
    /// # Parameters
    /// * `minter` - The identity performing the mint; must be enrolled
    /// * `to` - The identity receiving the token
    ///
    /// # Returns
    /// The identifier of the freshly minted token
    fn mint(&self, minter: &Identity, to: &Identity) -> Result<TokenId, LedgerError>;

    /// Current holder of a token
    fn owner_of(&self, token: TokenId) -> Result<Identity, LedgerError>;

    /// Allow `operator` to act on `holder`'s token
    fn approve(
        &self,
        holder: &Identity,
        operator: &Identity,
        token: TokenId,
    ) -> Result<(), LedgerError>;

    /// Whether `operator` may act on the token on its holder's behalf
    fn is_approved(&self, operator: &Identity, token: TokenId) -> Result<bool, LedgerError>;

    /// Number of tokens currently held by `identity`
    fn balance_of(&self, identity: &Identity) -> Result<u64, LedgerError>;
}

/// Multi-quantity ledger tracking fungible balances per share class.
pub trait MultiAssetLedger: Send + Sync {
    /// Opaque handle identifying this ledger instance
    fn ledger_id(&self) -> LedgerId;

    /// Mint `amount` units of `share` to `to`
    ///
    /// # Parameters
    /// * `minter` - The identity performing the mint; must be enrolled
    /// * `to` - The identity receiving the units
    /// * `share` - The share class minted under
    /// * `amount` - Number of units to mint
    fn mint_batch(
        &self,
        minter: &Identity,
        to: &Identity,
        share: ShareClassId,
        amount: u128,
    ) -> Result<(), LedgerError>;

    /// Destroy `amount` units of `share` held by `from`
    fn burn(&self, from: &Identity, share: ShareClassId, amount: u128) -> Result<(), LedgerError>;

    /// Units of `share` currently held by `identity`
    fn balance_of(&self, identity: &Identity, share: ShareClassId) -> Result<u128, LedgerError>;
}

#[derive(Debug, Default)]
struct AssetLedgerState {
    next_token: TokenId,
    holders: HashMap<TokenId, Identity>,
    approvals: HashMap<TokenId, HashSet<Identity>>,
    minters: HashSet<Identity>,
}

/// In-memory unique-asset ledger for tests and local runs
pub struct InMemoryAssetLedger {
    id: LedgerId,
    state: Mutex<AssetLedgerState>,
}

impl InMemoryAssetLedger {
    /// Create an empty ledger with the given handle
    pub fn new(id: LedgerId) -> Self {
        Self {
            id,
            state: Mutex::new(AssetLedgerState::default()),
        }
    }

    /// Enroll an identity allowed to mint on this ledger
    pub fn add_minter(&self, minter: Identity) {
        let mut state = self.state.lock().unwrap();
        state.minters.insert(minter);
    }
}

impl UniqueAssetLedger for InMemoryAssetLedger {
    fn ledger_id(&self) -> LedgerId {
        self.id
    }

    fn mint(&self, minter: &Identity, to: &Identity) -> Result<TokenId, LedgerError> {
        let mut state = self.state.lock().unwrap();
        if !state.minters.contains(minter) {
            return Err(LedgerError::NotMinter(minter.to_string()));
        }

        let token = state.next_token;
        state.holders.insert(token, *to);
        state.next_token += 1;
        Ok(token)
    }

    fn owner_of(&self, token: TokenId) -> Result<Identity, LedgerError> {
        let state = self.state.lock().unwrap();
        state
            .holders
            .get(&token)
            .copied()
            .ok_or(LedgerError::UnknownToken(token))
    }

    fn approve(
        &self,
        holder: &Identity,
        operator: &Identity,
        token: TokenId,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        match state.holders.get(&token) {
            None => return Err(LedgerError::UnknownToken(token)),
            Some(actual) if actual != holder => {
                return Err(LedgerError::NotHolder(holder.to_string(), token));
            }
            Some(_) => {}
        }
        state.approvals.entry(token).or_default().insert(*operator);
        Ok(())
    }

    fn is_approved(&self, operator: &Identity, token: TokenId) -> Result<bool, LedgerError> {
        let state = self.state.lock().unwrap();
        if !state.holders.contains_key(&token) {
            return Err(LedgerError::UnknownToken(token));
        }
        Ok(state
            .approvals
            .get(&token)
            .map_or(false, |operators| operators.contains(operator)))
    }

    fn balance_of(&self, identity: &Identity) -> Result<u64, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .holders
            .values()
            .filter(|holder| *holder == identity)
            .count() as u64)
    }
}

#[derive(Debug, Default)]
struct ShareLedgerState {
    balances: HashMap<ShareClassId, HashMap<Identity, u128>>,
    minters: HashSet<Identity>,
    // Remaining successful mints before an injected failure, if armed
    mints_before_failure: Option<u32>,
}

/// In-memory multi-quantity ledger for tests and local runs.
///
/// Carries a fail-injection knob so callers can exercise their
/// compensation paths against a ledger that dies mid-batch.
pub struct InMemoryShareLedger {
    id: LedgerId,
    state: Mutex<ShareLedgerState>,
}

impl InMemoryShareLedger {
    /// Create an empty ledger with the given handle
    pub fn new(id: LedgerId) -> Self {
        Self {
            id,
            state: Mutex::new(ShareLedgerState::default()),
        }
    }

    /// Enroll an identity allowed to mint on this ledger
    pub fn add_minter(&self, minter: Identity) {
        let mut state = self.state.lock().unwrap();
        state.minters.insert(minter);
    }

    /// Let the next `n` mints succeed, then reject every one after
    pub fn fail_after_mints(&self, n: u32) {
        let mut state = self.state.lock().unwrap();
        state.mints_before_failure = Some(n);
    }
}

impl MultiAssetLedger for InMemoryShareLedger {
    fn ledger_id(&self) -> LedgerId {
        self.id
    }

    fn mint_batch(
        &self,
        minter: &Identity,
        to: &Identity,
        share: ShareClassId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if !state.minters.contains(minter) {
            return Err(LedgerError::NotMinter(minter.to_string()));
        }
        match state.mints_before_failure.as_mut() {
            Some(0) => return Err(LedgerError::MintRejected("injected failure".to_string())),
            Some(remaining) => *remaining -= 1,
            None => {}
        }

        let balance = state
            .balances
            .entry(share)
            .or_default()
            .entry(*to)
            .or_insert(0);
        *balance += amount;
        Ok(())
    }

    fn burn(&self, from: &Identity, share: ShareClassId, amount: u128) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        let held = state
            .balances
            .get(&share)
            .and_then(|holders| holders.get(from))
            .copied()
            .unwrap_or(0);
        if held < amount {
            return Err(LedgerError::InsufficientBalance {
                share,
                held,
                requested: amount,
            });
        }
        if let Some(holders) = state.balances.get_mut(&share) {
            if let Some(balance) = holders.get_mut(from) {
                *balance -= amount;
            }
        }
        Ok(())
    }

    fn balance_of(&self, identity: &Identity, share: ShareClassId) -> Result<u128, LedgerError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .balances
            .get(&share)
            .and_then(|holders| holders.get(identity))
            .copied()
            .unwrap_or(0))
    }
}
