use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SpliceError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = SpliceError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(value).map(Self).map_err(|err| {
                    SpliceError::validation(format!(
                        "invalid {} '{value}': {err}",
                        stringify!($name)
                    ))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// A physical structure mounted in a node.
    StructureId
);
uuid_id!(ComponentTypeId);
uuid_id!(CableId);
uuid_id!(FiberId);
uuid_id!(
    /// A set of contiguous ports on one side that share a fiber.
    MergeGroupId
);

/// Identity of a splice row. Rows synthesized by an optimistic update carry a
/// temporary id until the authority answers with the persisted one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SpliceId {
    Persisted(Uuid),
    Temporary(Uuid),
}

impl SpliceId {
    pub fn persisted() -> Self {
        Self::Persisted(Uuid::new_v4())
    }

    pub fn temporary() -> Self {
        Self::Temporary(Uuid::new_v4())
    }

    pub fn is_temporary(self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}
