use crate::allowlist::abi;
use crate::allowlist::engine::Allowlist;
use crate::domain::types::{ParamValue, Validation};
use alloy_primitives::Address;
use log::debug;

/// Classify one call against an allowlist's rule set.
///
/// Conditions are tried in insertion order; the first one whose selector
/// matches, whose argument section decodes against its declared types,
/// whose implementation resolves, and whose validations all pass decides
/// the call (logical OR across conditions, logical AND with short-circuit
/// inside one condition). A decode failure or an unresolved
/// implementation makes that condition not applicable rather than
/// failing the call: an adversarial caller must never be able to force
/// an error path out of this function.
///
/// Pure: no engine state is mutated and the result depends only on the
/// three inputs and the current implementation predicates.
pub fn validate_calldata(allowlist: &Allowlist, target: Address, calldata: &[u8]) -> bool {
    let Some(incoming_selector) = calldata.get(..4) else {
        debug!(
            "calldata_rejected origin={} reason=no_selector len={}",
            allowlist.name(),
            calldata.len()
        );
        return false;
    };

    for stored in allowlist.stored_conditions() {
        if stored.selector.as_slice() != incoming_selector {
            continue;
        }
        let condition = &stored.condition;
        let args = match abi::decode_static_args(&calldata[4..], &condition.param_types) {
            Ok(args) => args,
            Err(reason) => {
                debug!(
                    "condition_not_applicable origin={} id={} reason={reason}",
                    allowlist.name(),
                    condition.id
                );
                continue;
            }
        };
        let Some(implementation) = allowlist.implementation_by_id(&condition.implementation_id)
        else {
            debug!(
                "condition_not_applicable origin={} id={} reason=implementation_missing",
                allowlist.name(),
                condition.id
            );
            continue;
        };

        let matched = condition.validations.iter().all(|validation| match validation {
            Validation::TargetCheck { capability_name } => {
                implementation.invoke(capability_name, &ParamValue::Address(target))
            }
            Validation::ParamCheck {
                capability_name,
                param_index,
            } => args
                .get(*param_index)
                .is_some_and(|arg| implementation.invoke(capability_name, arg)),
        });
        if matched {
            return true;
        }
    }
    false
}
