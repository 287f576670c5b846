//! Access decisions.
//!
//! [`decide`] is the pure base rule. [`AccessEngine::authorize`] layers the
//! two categorical blocks on top of it: no wabo material for email-login
//! callers, and no access-request documents unless public.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::iiif::{Source, UrlReference};
use crate::metadata::DossierMetadata;

use super::policy::{AccessPolicy, Scope};

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

/// Why a decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Ok,
    InvalidScope,
    Restricted,
    CopyrightBlocked,
    NotFoundInMetadata,
    NoWaboWithMailLogin,
    AccessRequestDocument,
}

impl ReasonCode {
    /// Stable identifier for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Ok => "ok",
            ReasonCode::InvalidScope => "invalid_scope",
            ReasonCode::Restricted => "restricted",
            ReasonCode::CopyrightBlocked => "copyright_blocked",
            ReasonCode::NotFoundInMetadata => "not_found_in_metadata",
            ReasonCode::NoWaboWithMailLogin => "no_wabo_with_mail_login",
            ReasonCode::AccessRequestDocument => "access_request_document",
        }
    }

    /// Human-readable text, used as the zip report reason.
    pub fn description(&self) -> &'static str {
        match self {
            ReasonCode::Ok => "access granted",
            ReasonCode::InvalidScope => "the login does not grant a valid scope",
            ReasonCode::Restricted => "the file is restricted",
            ReasonCode::CopyrightBlocked => {
                "copyright applies to the file and it cannot be shared through an email login"
            }
            ReasonCode::NotFoundInMetadata => "the document was not found in the metadata",
            ReasonCode::NoWaboWithMailLogin => {
                "permit files cannot be retrieved through an email login"
            }
            ReasonCode::AccessRequestDocument => {
                "the document is a restricted access request"
            }
        }
    }

    /// HTTP status for a denial with this reason.
    pub fn status(&self) -> StatusCode {
        match self {
            ReasonCode::Ok => StatusCode::OK,
            ReasonCode::NotFoundInMetadata => StatusCode::NOT_FOUND,
            ReasonCode::InvalidScope
            | ReasonCode::Restricted
            | ReasonCode::CopyrightBlocked
            | ReasonCode::NoWaboWithMailLogin
            | ReasonCode::AccessRequestDocument => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Outcome of an access decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessVerdict {
    pub decision: Decision,
    pub reason: ReasonCode,
}

impl AccessVerdict {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: ReasonCode::Ok,
        }
    }

    pub fn deny(reason: ReasonCode) -> Self {
        Self {
            decision: Decision::Deny,
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Decision::Allow
    }
}

/// Base access rule.
///
/// `scope` is `None` when the caller's raw scope is not recognized.
pub fn decide(metadata: &DossierMetadata, barcode: &str, scope: Option<Scope>) -> AccessVerdict {
    let Some(scope) = scope else {
        return AccessVerdict::deny(ReasonCode::InvalidScope);
    };

    let Some(document) = metadata.document(barcode) else {
        return AccessVerdict::deny(ReasonCode::NotFoundInMetadata);
    };

    let is_public = metadata.is_public(document);
    let has_copyright = is_public && document.copyright;

    match scope {
        Scope::Extended => AccessVerdict::allow(),
        Scope::PublicEmail if has_copyright => AccessVerdict::deny(ReasonCode::CopyrightBlocked),
        Scope::PublicEmail | Scope::Read if is_public => AccessVerdict::allow(),
        _ => AccessVerdict::deny(ReasonCode::Restricted),
    }
}

/// The caller as seen by the access engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Raw scope string, interpreted through the [`AccessPolicy`]
    pub scope: String,

    /// Email address of the caller, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the caller logged in through an emailed link
    #[serde(default)]
    pub is_mail_login: bool,
}

impl CallerContext {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            email: None,
            is_mail_login: false,
        }
    }

    /// A caller who logged in through an emailed link.
    pub fn mail_login(scope: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            email: Some(email.into()),
            is_mail_login: true,
        }
    }
}

/// Access decisions bound to one [`AccessPolicy`].
#[derive(Debug, Clone, Default)]
pub struct AccessEngine {
    policy: AccessPolicy,
}

impl AccessEngine {
    pub fn new(policy: AccessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Base rule with a raw scope string.
    pub fn decide(&self, metadata: &DossierMetadata, barcode: &str, raw_scope: &str) -> AccessVerdict {
        decide(metadata, barcode, self.policy.scope(raw_scope))
    }

    /// Full authorization of one reference for one caller.
    pub fn authorize(
        &self,
        metadata: &DossierMetadata,
        reference: &UrlReference,
        caller: &CallerContext,
    ) -> AccessVerdict {
        if caller.is_mail_login && reference.source == Source::Wabo {
            return AccessVerdict::deny(ReasonCode::NoWaboWithMailLogin);
        }

        let verdict = self.decide(metadata, &reference.document_barcode, &caller.scope);
        if !verdict.is_allowed() {
            return verdict;
        }

        match metadata.document(&reference.document_barcode) {
            Some(document) if document.is_access_request() && !metadata.is_public(document) => {
                AccessVerdict::deny(ReasonCode::AccessRequestDocument)
            }
            _ => verdict,
        }
    }
}
