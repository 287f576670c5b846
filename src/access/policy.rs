//! Access policy configuration.
//!
//! The policy is an immutable value built once from configuration and handed
//! to the components that need it. It owns every string the upstream systems
//! and tokens use to express scope, visibility and copyright.

use serde::{Deserialize, Serialize};

use crate::metadata::Access;

/// Default scope name granting public-only access through an email link.
pub const DEFAULT_PUBLIC_EMAIL_SCOPE: &str = "BD/P";

/// Default scope name granting read access to public material.
pub const DEFAULT_READ_SCOPE: &str = "BD/R";

/// Default scope name granting access to everything.
pub const DEFAULT_EXTENDED_SCOPE: &str = "BD/X";

/// Default metadata access value meaning "public".
pub const DEFAULT_PUBLIC_SENTINEL: &str = "PUBLIC";

/// Default metadata copyright value meaning "copyright applies".
pub const DEFAULT_COPYRIGHT_SENTINEL: &str = "J";

/// Caller privilege level, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Public material without copyright, via an email login link
    PublicEmail,

    /// All public material
    Read,

    /// Everything, including restricted material
    Extended,
}

/// Immutable mapping between external strings and access concepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    public_email_scope: String,
    read_scope: String,
    extended_scope: String,
    public_sentinel: String,
    copyright_sentinel: String,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            public_email_scope: DEFAULT_PUBLIC_EMAIL_SCOPE.to_string(),
            read_scope: DEFAULT_READ_SCOPE.to_string(),
            extended_scope: DEFAULT_EXTENDED_SCOPE.to_string(),
            public_sentinel: DEFAULT_PUBLIC_SENTINEL.to_string(),
            copyright_sentinel: DEFAULT_COPYRIGHT_SENTINEL.to_string(),
        }
    }
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the three scope names, least privileged first.
    pub fn scope_names(
        mut self,
        public_email: impl Into<String>,
        read: impl Into<String>,
        extended: impl Into<String>,
    ) -> Self {
        self.public_email_scope = public_email.into();
        self.read_scope = read.into();
        self.extended_scope = extended.into();
        self
    }

    /// Set the metadata access value that means "public".
    pub fn public_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.public_sentinel = sentinel.into();
        self
    }

    /// Set the metadata copyright value that means "copyright applies".
    pub fn copyright_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.copyright_sentinel = sentinel.into();
        self
    }

    /// Map a raw scope string to a [`Scope`]. Scope names are exact.
    pub fn scope(&self, raw: &str) -> Option<Scope> {
        if raw == self.extended_scope {
            Some(Scope::Extended)
        } else if raw == self.read_scope {
            Some(Scope::Read)
        } else if raw == self.public_email_scope {
            Some(Scope::PublicEmail)
        } else {
            None
        }
    }

    /// The configured name of a scope.
    pub fn scope_name(&self, scope: Scope) -> &str {
        match scope {
            Scope::PublicEmail => &self.public_email_scope,
            Scope::Read => &self.read_scope,
            Scope::Extended => &self.extended_scope,
        }
    }

    /// Highest recognized scope among `raw_scopes`.
    pub fn highest_scope<'a, I>(&self, raw_scopes: I) -> Option<Scope>
    where
        I: IntoIterator<Item = &'a str>,
    {
        raw_scopes
            .into_iter()
            .filter_map(|raw| self.scope(raw))
            .max()
    }

    /// Interpret a metadata access value.
    pub fn access_from(&self, raw: Option<&str>) -> Access {
        match raw {
            Some(value) if value.trim().eq_ignore_ascii_case(&self.public_sentinel) => {
                Access::Public
            }
            _ => Access::Restricted,
        }
    }

    /// Interpret a metadata copyright flag.
    pub fn has_copyright(&self, raw: Option<&str>) -> bool {
        matches!(raw, Some(value) if value.trim().eq_ignore_ascii_case(&self.copyright_sentinel))
    }
}
