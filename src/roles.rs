use crate::error::RegistryError;
use crate::id::Identity;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Capability classes recognized by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Full administrative control, including role management
    Owner,
    /// Authorized to mint land tokens
    Aaa,
    /// Holder-facing eligibility marker
    Customer,
    /// Held by the registry itself against the external ledgers
    Minter,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Owner => "OWNER",
            Role::Aaa => "AAA",
            Role::Customer => "CUSTOMER",
            Role::Minter => "MINTER",
        };
        write!(f, "{}", name)
    }
}

/// Role membership relation with the owner lockout guard.
///
/// The OWNER role can never reach zero holders: any revoke that would
/// empty it is rejected before membership changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessRegistry {
    members: HashMap<Role, HashSet<Identity>>,
}

impl AccessRegistry {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
        }
    }

    /// Add (role, identity) to the membership set.
    /// Granting an already-held role is a no-op, not an error.
    pub fn grant(&mut self, role: Role, identity: Identity) {
        self.members.entry(role).or_default().insert(identity);
    }

    /// Remove (role, identity) from the membership set.
    ///
    /// The guard is on the post-state, not on identity equality: an owner
    /// may revoke another owner's role as long as at least one remains.
    pub fn revoke(&mut self, role: Role, identity: &Identity) -> Result<(), RegistryError> {
        if role == Role::Owner
            && self.has_role(Role::Owner, identity)
            && self.holder_count(Role::Owner) <= 1
        {
            return Err(RegistryError::InvariantViolation(format!(
                "revoking {} from {} would leave the role with no holders",
                Role::Owner,
                identity
            )));
        }
        if let Some(holders) = self.members.get_mut(&role) {
            holders.remove(identity);
        }
        Ok(())
    }

    /// Pure membership query, never fails
    pub fn has_role(&self, role: Role, identity: &Identity) -> bool {
        self.members
            .get(&role)
            .map_or(false, |holders| holders.contains(identity))
    }

    /// Capability check consulted before every privileged operation
    pub fn require_role(&self, role: Role, identity: &Identity) -> Result<(), RegistryError> {
        if self.has_role(role, identity) {
            Ok(())
        } else {
            Err(RegistryError::Unauthorized(format!(
                "{} does not hold {}",
                identity, role
            )))
        }
    }

    /// Number of identities currently holding a role
    pub fn holder_count(&self, role: Role) -> usize {
        self.members.get(&role).map_or(0, |holders| holders.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(tag: u8) -> Identity {
        Identity::new([tag; 32])
    }

    #[test]
    fn test_grant_and_query() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);

        assert!(!registry.has_role(Role::Aaa, &alice));
        registry.grant(Role::Aaa, alice);
        assert!(registry.has_role(Role::Aaa, &alice));

        // Granting again is a no-op
        registry.grant(Role::Aaa, alice);
        assert_eq!(registry.holder_count(Role::Aaa), 1);
    }

    #[test]
    fn test_revoke_clears_membership() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);

        registry.grant(Role::Customer, alice);
        registry.revoke(Role::Customer, &alice).unwrap();
        assert!(!registry.has_role(Role::Customer, &alice));

        // Revoking a role that is not held is a no-op
        registry.revoke(Role::Customer, &alice).unwrap();
    }

    #[test]
    fn test_sole_owner_cannot_be_revoked() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);
        registry.grant(Role::Owner, alice);

        let err = registry.revoke(Role::Owner, &alice).unwrap_err();
        assert!(matches!(err, RegistryError::InvariantViolation(_)));
        assert!(registry.has_role(Role::Owner, &alice));
    }

    #[test]
    fn test_owner_revocable_once_successor_exists() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);
        let bob = identity(2);

        registry.grant(Role::Owner, alice);
        registry.grant(Role::Owner, bob);

        registry.revoke(Role::Owner, &alice).unwrap();
        assert!(!registry.has_role(Role::Owner, &alice));
        assert!(registry.has_role(Role::Owner, &bob));

        // Bob is now the sole owner and is protected again
        let err = registry.revoke(Role::Owner, &bob).unwrap_err();
        assert!(matches!(err, RegistryError::InvariantViolation(_)));
    }

    #[test]
    fn test_revoking_non_owner_never_trips_guard() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);
        let bob = identity(2);

        registry.grant(Role::Owner, alice);
        registry.grant(Role::Aaa, bob);

        // Bob does not hold OWNER, so revoking OWNER from him is a no-op
        registry.revoke(Role::Owner, &bob).unwrap();
        assert_eq!(registry.holder_count(Role::Owner), 1);
    }

    #[test]
    fn test_require_role() {
        let mut registry = AccessRegistry::new();
        let alice = identity(1);
        let bob = identity(2);

        registry.grant(Role::Owner, alice);
        registry.require_role(Role::Owner, &alice).unwrap();

        let err = registry.require_role(Role::Owner, &bob).unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
    }
}
