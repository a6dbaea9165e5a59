use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// One permitted operation signature plus its argument/target constraints.
///
/// The serde field order is the external reporting contract consumed by
/// off-chain tooling: `id`, `implementation_id`, `method_name`,
/// `param_types`, `validations`. The 4-byte selector is derived from
/// `method_name` and `param_types` when the condition is admitted and is
/// intentionally not part of the serialized form.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    /// Stable identifier, unique within its owning allowlist. Non-empty,
    /// no whitespace, case-sensitive.
    pub id: String,
    /// Key into the allowlist's validator implementation map.
    pub implementation_id: String,
    /// Method name, e.g. `approve`.
    pub method_name: String,
    /// Canonical primitive type tags, e.g. `["address", "uint256"]`.
    pub param_types: Vec<String>,
    /// Ordered rules, all of which must hold for a call to match. An
    /// empty list matches unconditionally once selector and decoding
    /// succeed.
    pub validations: Vec<Validation>,
}

/// A single validation rule inside a [`Condition`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    /// Invoke `capability_name` with the call target address.
    TargetCheck { capability_name: String },
    /// Invoke `capability_name` with the decoded argument at
    /// `param_index`. The index must be within the condition's declared
    /// arity at admission time.
    ParamCheck {
        capability_name: String,
        param_index: usize,
    },
}

impl Validation {
    /// The capability this rule invokes on the validator implementation.
    pub fn capability_name(&self) -> &str {
        match self {
            Validation::TargetCheck { capability_name } => capability_name,
            Validation::ParamCheck {
                capability_name, ..
            } => capability_name,
        }
    }
}

/// A decoded primitive argument (or the call target) handed to a
/// validator capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
    /// `address`, or the call target for [`Validation::TargetCheck`].
    Address(Address),
    /// Any `uintN` word.
    Uint(U256),
    /// `bool`.
    Bool(bool),
    /// The significant bytes of a `bytesN` word.
    Bytes(Vec<u8>),
}
