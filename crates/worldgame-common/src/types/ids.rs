//! Entity identifiers
//!
//! String ids are supplied by collaborators (scenario files, crisis
//! scheduler); numeric ids are minted by the engine itself.

use serde::{Deserialize, Serialize};

/// Simulated day counter
pub type Day = u32;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "-{:04}"), self.0)
            }
        }
    };
}

string_id!(
    /// Resource identifier
    ResourceId
);
string_id!(
    /// Need identifier
    NeedId
);
string_id!(
    /// Community (network node) identifier
    CommunityId
);
string_id!(
    /// Bioregion identifier
    RegionId
);
string_id!(
    /// Challenge identifier
    ChallengeId
);

numeric_id!(
    /// Governance proposal identifier
    ProposalId,
    "proposal"
);
numeric_id!(
    /// Allocation plan identifier
    PlanId,
    "plan"
);

impl NeedId {
    /// Id of the need a challenge response registers for one affected region.
    pub fn for_challenge(challenge: &ChallengeId, region: &RegionId) -> Self {
        Self(format!("{}:{}", challenge, region))
    }
}
