//! Seams to the allowlist's external collaborators.
//!
//! A validator implementation is an opaque, addressable predicate set:
//! the engine holds it by handle and asks it two things only — whether a
//! named capability exists, and whether a value passes it. An owner
//! resolver maps a human-readable origin to the identity allowed to
//! control that origin's allowlist. Both are trait objects so tests and
//! hosts can swap providers freely.

use crate::domain::types::ParamValue;
use alloy_primitives::Address;
use std::collections::BTreeMap;
use std::fmt;

/// A pluggable set of named boolean capabilities used to validate call
/// targets and decoded arguments.
pub trait ValidatorImplementation: fmt::Debug + Send + Sync {
    /// Introspection: does this implementation expose `name`?
    fn has_capability(&self, name: &str) -> bool;

    /// Evaluate the capability `name` against `value`. Implementations
    /// are expected to be deterministic and side-effect free per call;
    /// an unknown capability must answer `false`, never panic.
    fn invoke(&self, name: &str, value: &ParamValue) -> bool;
}

/// Maps an origin string to the identity authorized to control it.
pub trait OwnerResolver: fmt::Debug + Send + Sync {
    /// The controlling identity for `origin`, or `None` if the origin
    /// cannot be resolved.
    fn resolve_owner(&self, origin: &str) -> Option<Address>;
}

type CapabilityPredicate = Box<dyn Fn(&ParamValue) -> bool + Send + Sync>;

/// In-memory [`ValidatorImplementation`] assembled from named closures.
///
/// The default instance exposes no capabilities at all, which makes every
/// condition referencing it invalid — handy for exercising the staged
/// registration path.
#[derive(Default)]
pub struct MockImplementation {
    capabilities: BTreeMap<String, CapabilityPredicate>,
}

impl MockImplementation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `predicate` under `name`.
    pub fn with_capability(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&ParamValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.capabilities.insert(name.into(), Box::new(predicate));
        self
    }

    /// Register a capability that answers `true` exactly for the given
    /// addresses, whether they arrive as a call target or as a decoded
    /// `address` argument.
    pub fn with_address_set(self, name: impl Into<String>, addresses: Vec<Address>) -> Self {
        self.with_capability(name, move |value| match value {
            ParamValue::Address(address) => addresses.contains(address),
            _ => false,
        })
    }
}

impl fmt::Debug for MockImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockImplementation")
            .field(
                "capabilities",
                &self.capabilities.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ValidatorImplementation for MockImplementation {
    fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    fn invoke(&self, name: &str, value: &ParamValue) -> bool {
        match self.capabilities.get(name) {
            Some(predicate) => predicate(value),
            None => false,
        }
    }
}

/// Fixed origin → owner table backing [`OwnerResolver`].
#[derive(Clone, Debug, Default)]
pub struct StaticOwnerResolver {
    owners: BTreeMap<String, Address>,
}

impl StaticOwnerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_origin(mut self, origin: impl Into<String>, owner: Address) -> Self {
        self.owners.insert(origin.into(), owner);
        self
    }
}

impl OwnerResolver for StaticOwnerResolver {
    fn resolve_owner(&self, origin: &str) -> Option<Address> {
        self.owners.get(origin).copied()
    }
}
