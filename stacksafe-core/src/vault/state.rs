//! Vault lifecycle states.

use serde::{Deserialize, Serialize};

/// Where a vault is in its lifecycle.
///
/// The vault only ever moves forward:
/// - `Registered` → `NomineeEnrolled` (nominee passed OTP + passphrase once)
/// - `NomineeEnrolled` → `Claimed` (nominee passed the claim challenge, secret released)
///
/// `Claimed` is terminal; the record is kept as an audit trail.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VaultState {
    /// Contract deployed, nominee not yet enrolled
    #[default]
    Registered,
    /// Nominee verified their contact and passphrase
    NomineeEnrolled,
    /// Secret released to the ledger
    Claimed,
}

impl VaultState {
    /// The single state this one may advance to, if any.
    pub fn next(self) -> Option<VaultState> {
        match self {
            Self::Registered => Some(Self::NomineeEnrolled),
            Self::NomineeEnrolled => Some(Self::Claimed),
            Self::Claimed => None,
        }
    }

    pub fn can_advance_to(self, target: VaultState) -> bool {
        self.next() == Some(target)
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for VaultState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "Registered"),
            Self::NomineeEnrolled => write!(f, "NomineeEnrolled"),
            Self::Claimed => write!(f, "Claimed"),
        }
    }
}
