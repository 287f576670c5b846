//! Scope-based access control.
//!
//! ```text
//! raw scope ──► AccessPolicy::scope ──► Scope
//!                                          │
//! DossierMetadata + barcode ─────────► decide ──► AccessVerdict
//! ```
//!
//! Nothing here performs I/O.

mod decision;
mod policy;

pub use decision::{decide, AccessEngine, AccessVerdict, CallerContext, Decision, ReasonCode};
pub use policy::{
    AccessPolicy, Scope, DEFAULT_COPYRIGHT_SENTINEL, DEFAULT_EXTENDED_SCOPE,
    DEFAULT_PUBLIC_EMAIL_SCOPE, DEFAULT_PUBLIC_SENTINEL, DEFAULT_READ_SCOPE,
};
