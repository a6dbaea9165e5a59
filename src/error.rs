use alloy_primitives::Address;
use thiserror::Error;

/// Failure taxonomy for allowlist and registry operations.
///
/// Every mutating operation either completes in full or fails with one of
/// these variants and no state change. The calldata read path never
/// surfaces decode problems through this type; malformed calldata is
/// folded into a non-match.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllowlistError {
    #[error("caller {caller} is not the allowlist owner {owner}")]
    Unauthorized { caller: Address, owner: Address },

    #[error("condition id must be non-empty and contain no whitespace: {0:?}")]
    MalformedConditionId(String),

    #[error("method name must be non-empty and contain no whitespace: {0:?}")]
    MalformedMethodName(String),

    #[error("condition id {0} already exists")]
    DuplicateConditionId(String),

    #[error("condition id {0} not found")]
    ConditionNotFound(String),

    #[error("implementation id {0} is not configured")]
    ImplementationNotFound(String),

    #[error("unsupported param type: {0}")]
    UnsupportedParamType(String),

    #[error("param index {index} is out of range for {arity} declared params")]
    ParamIndexOutOfRange { index: usize, arity: usize },

    #[error("implementation {implementation_id} does not expose capability {capability_name}")]
    MissingCapability {
        implementation_id: String,
        capability_name: String,
    },

    #[error("cannot finalize {0}: allowlist has no conditions")]
    EmptyRuleSet(String),

    #[error("condition set is invalid: {0}")]
    InvalidConditionSet(String),

    #[error("origin {0} is already registered")]
    AlreadyRegistered(String),

    #[error("origin {0} is not registered")]
    OriginNotRegistered(String),

    #[error("origin {0} has no resolvable owner")]
    OwnerNotResolved(String),

    #[error("failed to serialize conditions: {0}")]
    Serialization(String),
}
