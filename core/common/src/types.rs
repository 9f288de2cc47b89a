//! Common identifier types used throughout TaskVault.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Well-known background-drain trigger tag, shared by producer and consumer.
pub const SYNC_TAG: &str = "taskvault-sync";

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Create from an existing string.
            ///
            /// # Errors
            /// - Returns error if the id is empty
            pub fn new(id: impl Into<String>) -> crate::Result<Self> {
                let id = id.into();
                if id.is_empty() {
                    return Err(crate::Error::Validation(format!(
                        "{} cannot be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(id))
            }

            /// Get the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for a task record. Opaque and immutable.
    TaskId
}

id_type! {
    /// Unique identifier for a category record.
    CategoryId
}

id_type! {
    /// Unique identifier for a queued sync operation.
    OperationId
}

id_type! {
    /// Unique identifier for a live execution context (tab, background worker).
    ContextId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_id_fails() {
        assert!(TaskId::new("").is_err());
        assert!(ContextId::new("").is_err());
    }

    #[test]
    fn id_round_trips_through_json() {
        let id = TaskId::new("task-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"task-42\"");
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
