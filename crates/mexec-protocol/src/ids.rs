//! Correlation identifiers carried by executor events.
//!
//! Every id is an opaque, serde-transparent `String` wrapper. The market,
//! payment and activity APIs hand out their own identifiers, so the executor
//! never parses them; it only compares, hashes and displays them.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Create a new random id (UUID v4). Mostly useful for tests and simulations.
            pub fn new_uuid() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Market subscription (demand) identifier.
    SubscriptionId
);
typed_id!(
    /// Negotiation proposal identifier.
    ProposalId
);
typed_id!(
    /// Provider agreement identifier.
    AgreementId
);
typed_id!(
    /// Identifier of a unit of work submitted to the executor.
    TaskId
);
typed_id!(
    /// Remote activity identifier, created under an agreement.
    ActivityId
);
typed_id!(
    /// Invoice identifier issued by a provider.
    InvoiceId
);
typed_id!(
    /// Provider node identifier as seen on the market.
    ProviderId
);
