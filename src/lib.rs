//! Calldata policy engine: per-protocol allowlists of permitted
//! operations and argument constraints.
//!
//! Given a call target and an opaque calldata payload, the crate decides
//! whether the call conforms to a protocol-defined allowlist. Each
//! protocol owns one [`Allowlist`] — an ordered set of [`Condition`]s
//! describing a permitted method signature plus target/argument rules
//! evaluated by pluggable [`ValidatorImplementation`]s. The
//! [`AllowlistRegistry`] directory hands out instances per origin and
//! runs the two-phase registration lifecycle that gates enforcement on a
//! non-empty, fully valid rule set.
//!
//! Identity resolution ([`OwnerResolver`]) and validator predicates are
//! injected; the engine holds them by handle only. The calldata read
//! path never errors on malformed input — an undecodable call simply
//! matches nothing.

pub mod allowlist;
pub mod domain;
pub mod error;
pub mod provider;
pub mod registry;

pub use allowlist::engine::Allowlist;
pub use allowlist::validator::validate_calldata;
pub use domain::types::{Condition, ParamValue, Validation};
pub use error::AllowlistError;
pub use provider::{
    MockImplementation, OwnerResolver, StaticOwnerResolver, ValidatorImplementation,
};
pub use registry::AllowlistRegistry;
