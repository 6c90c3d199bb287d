use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::ops::Deref;

/// Sequential identifier of a land token within one unique-asset ledger
pub type TokenId = u64;

/// Identifier of a fungible share class within one multi-quantity ledger
pub type ShareClassId = u64;

// Identity uniquely identifies an actor known to the registry.
// It is a 32 byte long unique identifier, resembling a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity([u8; 32]);

impl Default for Identity {
    fn default() -> Self {
        Identity([0; 32])
    }
}

impl Deref for Identity {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Identity {
    pub fn new(bytes: [u8; 32]) -> Self {
        Identity(bytes)
    }

    pub fn create_identity_bytes(seeds: &[&[u8]], bump: u8) -> [u8; 32] {
        let mut hasher = Sha256::new();

        // Domain separator
        hasher.update(b"LAND_Registry");

        // Add all seeds
        for seed in seeds {
            hasher.update(seed);
        }

        // Add bump
        hasher.update([bump]);

        hasher.finalize().into()
    }

    /// Whether a 32-byte array is not a valid point on the ed25519 curve.
    /// Derived identities must be off-curve so no keypair can sign for them.
    pub fn is_off_curve(bytes: &[u8; 32]) -> bool {
        let Ok(compressed_edwards_y) = CompressedEdwardsY::from_slice(bytes.as_ref()) else {
            return false;
        };
        compressed_edwards_y.decompress().is_none()
    }

    /// Try to find a keyless Identity for the given seeds
    pub fn try_derive(seeds: &[&[u8]]) -> Option<(Identity, u8)> {
        for bump in 0..=255 {
            let id = Identity::create_identity_bytes(seeds, bump);
            if Identity::is_off_curve(&id) {
                return Some((Identity(id), bump));
            }
        }
        None
    }

    /// Find a keyless Identity for the given seeds
    pub fn derive(seeds: &[&[u8]]) -> Identity {
        Identity::try_derive(seeds)
            .expect("no off-curve identity for seeds")
            .0
    }
}

// LedgerId is an opaque 32 byte handle naming one external asset ledger
// instance (a unique-asset ledger or a multi-quantity share ledger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerId([u8; 32]);

impl Deref for LedgerId {
    type Target = [u8; 32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for LedgerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl LedgerId {
    pub fn new(bytes: [u8; 32]) -> Self {
        LedgerId(bytes)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn test_new_identity() {
        let test_bytes = [7u8; 32];
        let id = Identity::new(test_bytes);
        assert_eq!(*id, test_bytes);
    }

    #[test]
    fn test_create_identity_bytes() {
        let seed1 = b"registry_seed_1";
        let seed2 = b"registry_seed_2";
        let bump = 5;

        let id = Identity::create_identity_bytes(&[seed1, seed2], bump);

        // Deterministic for the same inputs
        let id2 = Identity::create_identity_bytes(&[seed1, seed2], bump);
        assert_eq!(id, id2);

        // Changing bump changes the result
        let id3 = Identity::create_identity_bytes(&[seed1, seed2], bump + 1);
        assert_ne!(id, id3);

        // Changing seed order changes the result
        let id4 = Identity::create_identity_bytes(&[seed2, seed1], bump);
        assert_ne!(id, id4);
    }

    #[test]
    fn test_derive_is_off_curve() {
        let seed = b"curve_test_seed";
        let (id, _) = Identity::try_derive(&[seed]).unwrap();

        assert!(Identity::is_off_curve(&id));
    }

    #[test]
    fn test_derive_stable() {
        let seed = b"stable_seed";

        let (id, bump) = Identity::try_derive(&[seed]).unwrap();
        let raw = Identity::create_identity_bytes(&[seed], bump);
        assert_eq!(*id, raw);

        // Same seeds always derive the same identity
        assert_eq!(id, Identity::derive(&[seed]));

        // Different seeds derive different identities
        let other = Identity::derive(&[b"another_seed".as_slice()]);
        assert_ne!(id, other);
    }

    #[test]
    fn test_identity_display_is_hex() {
        let id = Identity::new([0xab; 32]);
        assert_eq!(id.to_string(), "ab".repeat(32));
    }

    #[test]
    fn test_ledger_id_display_is_hex() {
        let ledger = LedgerId::new([0x01; 32]);
        assert_eq!(ledger.to_string(), "01".repeat(32));
    }
}
