//! Server-assigned identifiers.
//!
//! Every id is an opaque string chosen by the backend. They serialize as
//! bare JSON strings so that `join:project` can carry a project id directly.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
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

string_id!(
    /// Identifies a task.
    TaskId
);
string_id!(
    /// Identifies a project; also the realtime room key.
    ProjectId
);
string_id!(
    /// Identifies a board column (workflow state) within a project.
    ColumnId
);
string_id!(
    /// Identifies a user (assignee, comment author, presence subject).
    UserId
);
string_id!(
    /// Identifies a task comment.
    CommentId
);
