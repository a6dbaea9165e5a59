use crate::allowlist::{abi, validator};
use crate::domain::types::{Condition, Validation};
use crate::error::AllowlistError;
use crate::provider::ValidatorImplementation;
use alloy_primitives::Address;
use log::info;
use std::sync::Arc;

/// A condition plus its selector, computed once at admission.
#[derive(Clone, Debug)]
pub(crate) struct StoredCondition {
    pub(crate) condition: Condition,
    pub(crate) selector: [u8; 4],
}

#[derive(Clone, Debug)]
struct ImplementationEntry {
    id: String,
    implementation: Arc<dyn ValidatorImplementation>,
}

/// One protocol's rule set: an ordered validator implementation map and
/// an ordered, unique-id condition list, mutable only by the recorded
/// owner.
///
/// Every mutating operation checks the caller first and validates its
/// whole input before touching state, so a failure never leaves a
/// partial change behind. Batch operations stage on a copy of the
/// condition list and swap it in on success.
#[derive(Clone, Debug)]
pub struct Allowlist {
    name: String,
    owner: Address,
    implementations: Vec<ImplementationEntry>,
    conditions: Vec<StoredCondition>,
}

impl Allowlist {
    /// Create an empty allowlist bound to `name` and controlled by `owner`.
    pub fn new(name: impl Into<String>, owner: Address) -> Self {
        Self {
            name: name.into(),
            owner,
            implementations: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Instantiate a copy of this allowlist for a new origin and owner.
    ///
    /// This is the cloning primitive the registry uses to stamp out
    /// instances from its canonical template: state is carried over,
    /// identity is rebound.
    pub fn clone_for(&self, name: impl Into<String>, owner: Address) -> Self {
        Self {
            name: name.into(),
            owner,
            implementations: self.implementations.clone(),
            conditions: self.conditions.clone(),
        }
    }

    /// The origin this allowlist is bound to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identity authorized to mutate this allowlist.
    pub fn owner_address(&self) -> Address {
        self.owner
    }

    fn ensure_owner(&self, caller: Address) -> Result<(), AllowlistError> {
        if caller != self.owner {
            return Err(AllowlistError::Unauthorized {
                caller,
                owner: self.owner,
            });
        }
        Ok(())
    }

    // ── Implementations ──────────────────────────────────────────────────

    /// Upsert a validator implementation under `id`. A new id is appended
    /// to the ordered list; an existing id is swapped in place.
    ///
    /// Conditions referencing `id` are not re-checked here: validity is
    /// recomputed lazily by [`conditions_valid`](Self::conditions_valid),
    /// so a swap can invalidate previously-valid conditions without any
    /// condition mutation.
    pub fn set_implementation(
        &mut self,
        caller: Address,
        id: &str,
        implementation: Arc<dyn ValidatorImplementation>,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        match self.implementations.iter_mut().find(|entry| entry.id == id) {
            Some(entry) => entry.implementation = implementation,
            None => self.implementations.push(ImplementationEntry {
                id: id.to_string(),
                implementation,
            }),
        }
        info!("implementation_set origin={} id={id}", self.name);
        Ok(())
    }

    /// Implementation handle for `id`, or `None` if not configured.
    pub fn implementation_by_id(&self, id: &str) -> Option<Arc<dyn ValidatorImplementation>> {
        self.implementations
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| Arc::clone(&entry.implementation))
    }

    /// Implementation ids in insertion order.
    pub fn implementations_ids_list(&self) -> Vec<String> {
        self.implementations
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// (id, handle) pairs in insertion order.
    pub fn implementations_list(&self) -> Vec<(String, Arc<dyn ValidatorImplementation>)> {
        self.implementations
            .iter()
            .map(|entry| (entry.id.clone(), Arc::clone(&entry.implementation)))
            .collect()
    }

    // ── Condition CRUD ───────────────────────────────────────────────────

    /// Add a fully-validated condition.
    pub fn add_condition(
        &mut self,
        caller: Address,
        condition: Condition,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let stored = admit(condition)?;
        ensure_unique(&self.conditions, &stored.condition.id)?;
        self.condition_checks(&stored.condition)?;
        self.push_condition(stored);
        Ok(())
    }

    /// Add a batch of fully-validated conditions, atomically.
    pub fn add_conditions(
        &mut self,
        caller: Address,
        conditions: Vec<Condition>,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let mut staged = self.conditions.clone();
        for condition in conditions {
            let stored = admit(condition)?;
            ensure_unique(&staged, &stored.condition.id)?;
            self.condition_checks(&stored.condition)?;
            staged.push(stored);
        }
        self.commit_conditions(staged);
        Ok(())
    }

    /// Add a condition applying only the structural checks: id
    /// well-formedness and uniqueness, method-name and param-type
    /// admissibility, and `ParamCheck` index bounds. Implementation
    /// resolution and capability introspection are skipped, which lets an
    /// owner stage a rule set before wiring its validator implementation.
    pub fn add_condition_without_validation(
        &mut self,
        caller: Address,
        condition: Condition,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let stored = admit(condition)?;
        ensure_unique(&self.conditions, &stored.condition.id)?;
        self.push_condition(stored);
        Ok(())
    }

    /// Batch form of [`add_condition_without_validation`](Self::add_condition_without_validation),
    /// atomic across the batch.
    pub fn add_conditions_without_validation(
        &mut self,
        caller: Address,
        conditions: Vec<Condition>,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let mut staged = self.conditions.clone();
        for condition in conditions {
            let stored = admit(condition)?;
            ensure_unique(&staged, &stored.condition.id)?;
            staged.push(stored);
        }
        self.commit_conditions(staged);
        Ok(())
    }

    /// Replace the condition whose id matches `condition.id`, in place,
    /// re-applying the same validation as [`add_condition`](Self::add_condition).
    pub fn update_condition(
        &mut self,
        caller: Address,
        condition: Condition,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let stored = admit(condition)?;
        let position = self
            .position(&stored.condition.id)
            .ok_or_else(|| AllowlistError::ConditionNotFound(stored.condition.id.clone()))?;
        self.condition_checks(&stored.condition)?;
        info!(
            "condition_updated origin={} id={}",
            self.name, stored.condition.id
        );
        self.conditions[position] = stored;
        Ok(())
    }

    /// Delete the condition with the given id. Deleting an unknown id is
    /// an error, not a no-op: a silent miss would hide a caller bug.
    pub fn delete_condition(&mut self, caller: Address, id: &str) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let position = self
            .position(id)
            .ok_or_else(|| AllowlistError::ConditionNotFound(id.to_string()))?;
        self.conditions.remove(position);
        info!("condition_deleted origin={} id={id}", self.name);
        Ok(())
    }

    /// Delete a batch of conditions by id, atomically. Relative order of
    /// the surviving conditions is preserved.
    pub fn delete_conditions(
        &mut self,
        caller: Address,
        ids: &[String],
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let mut staged = self.conditions.clone();
        for id in ids {
            let position = staged
                .iter()
                .position(|stored| stored.condition.id == *id)
                .ok_or_else(|| AllowlistError::ConditionNotFound(id.clone()))?;
            staged.remove(position);
        }
        self.commit_conditions(staged);
        Ok(())
    }

    /// Remove every condition.
    pub fn delete_all_conditions(&mut self, caller: Address) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let removed = self.conditions.len();
        self.conditions.clear();
        info!("conditions_cleared origin={} removed={removed}", self.name);
        Ok(())
    }

    /// Atomically swap the entire rule set for `conditions`, applying
    /// [`add_condition`](Self::add_condition)'s full validation to each
    /// entry. This is the primitive behind protocol re-registration.
    pub fn replace_conditions(
        &mut self,
        caller: Address,
        conditions: Vec<Condition>,
    ) -> Result<(), AllowlistError> {
        self.ensure_owner(caller)?;
        let mut staged = Vec::with_capacity(conditions.len());
        for condition in conditions {
            let stored = admit(condition)?;
            ensure_unique(&staged, &stored.condition.id)?;
            self.condition_checks(&stored.condition)?;
            staged.push(stored);
        }
        info!(
            "conditions_replaced origin={} count={}",
            self.name,
            staged.len()
        );
        self.conditions = staged;
        Ok(())
    }

    // ── Read surface ─────────────────────────────────────────────────────

    pub fn conditions_length(&self) -> usize {
        self.conditions.len()
    }

    /// Positional id accessor, derived from insertion order.
    pub fn conditions_ids(&self, index: usize) -> Option<String> {
        self.conditions
            .get(index)
            .map(|stored| stored.condition.id.clone())
    }

    /// Condition ids in insertion order.
    pub fn conditions_ids_list(&self) -> Vec<String> {
        self.conditions
            .iter()
            .map(|stored| stored.condition.id.clone())
            .collect()
    }

    /// The full ordered condition list.
    pub fn conditions_list(&self) -> Vec<Condition> {
        self.conditions
            .iter()
            .map(|stored| stored.condition.clone())
            .collect()
    }

    pub fn condition_by_id(&self, id: &str) -> Option<Condition> {
        self.position(id)
            .map(|position| self.conditions[position].condition.clone())
    }

    /// Stable JSON rendering of the ordered condition list for off-chain
    /// consumption.
    pub fn conditions_json(&self) -> Result<String, AllowlistError> {
        serde_json::to_string(&self.conditions_list())
            .map_err(|error| AllowlistError::Serialization(error.to_string()))
    }

    /// True iff every condition independently satisfies implementation
    /// resolution, index bounds, and capability introspection against
    /// the *current* implementation map. Recomputed on every call:
    /// implementation swaps can invalidate previously-valid conditions
    /// without any condition mutation, so a cached flag would lie.
    pub fn conditions_valid(&self) -> bool {
        self.conditions
            .iter()
            .all(|stored| self.condition_checks(&stored.condition).is_ok())
    }

    /// Assert [`conditions_valid`](Self::conditions_valid), reporting the
    /// first offending condition.
    pub fn validate_conditions(&self) -> Result<(), AllowlistError> {
        for stored in &self.conditions {
            if let Err(error) = self.condition_checks(&stored.condition) {
                return Err(AllowlistError::InvalidConditionSet(format!(
                    "condition {}: {error}",
                    stored.condition.id
                )));
            }
        }
        Ok(())
    }

    /// Classify a call against this rule set. See
    /// [`validator::validate_calldata`].
    pub fn validate_calldata(&self, target: Address, calldata: &[u8]) -> bool {
        validator::validate_calldata(self, target, calldata)
    }

    pub(crate) fn stored_conditions(&self) -> &[StoredCondition] {
        &self.conditions
    }

    // ── Internals ────────────────────────────────────────────────────────

    /// The implementation-dependent half of condition validity,
    /// evaluated against the current implementation map.
    fn condition_checks(&self, condition: &Condition) -> Result<(), AllowlistError> {
        let implementation = self
            .implementation_by_id(&condition.implementation_id)
            .ok_or_else(|| {
                AllowlistError::ImplementationNotFound(condition.implementation_id.clone())
            })?;
        for validation in &condition.validations {
            if let Validation::ParamCheck { param_index, .. } = validation {
                if *param_index >= condition.param_types.len() {
                    return Err(AllowlistError::ParamIndexOutOfRange {
                        index: *param_index,
                        arity: condition.param_types.len(),
                    });
                }
            }
            let capability_name = validation.capability_name();
            if !implementation.has_capability(capability_name) {
                return Err(AllowlistError::MissingCapability {
                    implementation_id: condition.implementation_id.clone(),
                    capability_name: capability_name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.conditions
            .iter()
            .position(|stored| stored.condition.id == id)
    }

    fn push_condition(&mut self, stored: StoredCondition) {
        info!(
            "condition_added origin={} id={} selector=0x{}",
            self.name,
            stored.condition.id,
            hex::encode(stored.selector)
        );
        self.conditions.push(stored);
    }

    fn commit_conditions(&mut self, staged: Vec<StoredCondition>) {
        info!(
            "conditions_committed origin={} count={}",
            self.name,
            staged.len()
        );
        self.conditions = staged;
    }
}

/// Structural admission: normalize the condition into canonical form and
/// compute its selector. Id well-formedness, method-name and param-type
/// admissibility, and `ParamCheck` index bounds are always enforced here,
/// even on the without-validation path — the selector and decode plan
/// must be computable for the id-keyed index to stay coherent.
fn admit(condition: Condition) -> Result<StoredCondition, AllowlistError> {
    if condition.id.is_empty() || condition.id.chars().any(char::is_whitespace) {
        return Err(AllowlistError::MalformedConditionId(condition.id));
    }
    let method_name = abi::normalize_method_name(&condition.method_name)?;
    let param_types = condition
        .param_types
        .iter()
        .map(|kind| abi::normalize_param_type(kind))
        .collect::<Result<Vec<_>, _>>()?;
    for validation in &condition.validations {
        if let Validation::ParamCheck { param_index, .. } = validation {
            if *param_index >= param_types.len() {
                return Err(AllowlistError::ParamIndexOutOfRange {
                    index: *param_index,
                    arity: param_types.len(),
                });
            }
        }
    }
    let selector = abi::selector(&abi::canonical_signature(&method_name, &param_types));
    Ok(StoredCondition {
        condition: Condition {
            id: condition.id,
            implementation_id: condition.implementation_id,
            method_name,
            param_types,
            validations: condition.validations,
        },
        selector,
    })
}

fn ensure_unique(staged: &[StoredCondition], id: &str) -> Result<(), AllowlistError> {
    if staged.iter().any(|stored| stored.condition.id == id) {
        return Err(AllowlistError::DuplicateConditionId(id.to_string()));
    }
    Ok(())
}
