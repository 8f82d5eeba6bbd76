use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::temporal::Timestamp;

/// Who made a change and when.
///
/// Commits carry two signatures, author and committer, following the usual
/// version-control convention. For Relaxo they are normally identical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub when: Timestamp,
}

impl Signature {
    /// Build a signature stamped with the current time.
    ///
    /// Names and emails must not contain `<`, `>` or line breaks, which would
    /// make the `Name <email>` form ambiguous.
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Result<Self, TypeError> {
        Self::new(name, email, Timestamp::now())
    }

    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        when: Timestamp,
    ) -> Result<Self, TypeError> {
        let name = name.into();
        let email = email.into();
        for field in [&name, &email] {
            if field.contains(['<', '>', '\n', '\r']) {
                return Err(TypeError::InvalidSignature(format!(
                    "forbidden character in {field:?}"
                )));
            }
        }
        if name.trim().is_empty() {
            return Err(TypeError::InvalidSignature("name must not be empty".into()));
        }
        Ok(Self { name, email, when })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
