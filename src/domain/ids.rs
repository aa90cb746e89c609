//! Identifier newtypes
//!
//! Ids are opaque strings issued by the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

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

string_id!(
    /// Course the dashboard session is scoped to
    CourseId
);
string_id!(
    /// Lesson identifier
    LessonId
);
string_id!(
    /// Module identifier
    ModuleId
);

impl LessonId {
    /// Creation time encoded in a 24-hex-digit object id (leading 4 bytes,
    /// seconds since epoch). Other id shapes carry no time.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if self.0.len() != 24 || !self.0.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let secs = u32::from_str_radix(&self.0[..8], 16).ok()?;
        DateTime::<Utc>::from_timestamp(i64::from(secs), 0)
    }
}
