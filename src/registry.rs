//! Protocol directory — per-origin allowlist instances and the two-phase
//! registration lifecycle.
//!
//! Each origin moves through `Unregistered → Draft → Finalized`:
//! [`AllowlistRegistry::start_protocol_registration`] clones the
//! registry's template into a Draft instance owned by the resolved
//! protocol owner, and
//! [`AllowlistRegistry::finish_protocol_registration`] finalizes it once
//! the rule set is non-empty and fully valid. Finalization is monotonic;
//! a finalized rule set can only be swapped wholesale through
//! [`AllowlistRegistry::reregister_protocol`].

use crate::allowlist::engine::Allowlist;
use crate::allowlist::validator;
use crate::domain::types::Condition;
use crate::error::AllowlistError;
use crate::provider::OwnerResolver;
use alloy_primitives::Address;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct RegistryEntry {
    allowlist: Allowlist,
    finalized: bool,
}

/// Origin-keyed directory of [`Allowlist`] instances.
#[derive(Clone, Debug)]
pub struct AllowlistRegistry {
    resolver: Arc<dyn OwnerResolver>,
    template: Allowlist,
    entries: BTreeMap<String, RegistryEntry>,
    registered_origins: Vec<String>,
}

impl AllowlistRegistry {
    /// Build a registry around an owner resolver and the canonical
    /// template every new instance is cloned from.
    pub fn new(resolver: Arc<dyn OwnerResolver>, template: Allowlist) -> Self {
        Self {
            resolver,
            template,
            entries: BTreeMap::new(),
            registered_origins: Vec::new(),
        }
    }

    /// The identity controlling `origin`, per the configured resolver.
    pub fn protocol_owner_address_by_origin_name(
        &self,
        origin: &str,
    ) -> Result<Address, AllowlistError> {
        self.resolver
            .resolve_owner(origin)
            .ok_or_else(|| AllowlistError::OwnerNotResolved(origin.to_string()))
    }

    /// Open a Draft registration for `origin`: resolve its owner, check
    /// the caller is that owner, and record a fresh template clone. Fails
    /// `AlreadyRegistered` for any existing entry, Draft or Finalized —
    /// replacing a live rule set must go through
    /// [`reregister_protocol`](Self::reregister_protocol).
    pub fn start_protocol_registration(
        &mut self,
        caller: Address,
        origin: &str,
    ) -> Result<(), AllowlistError> {
        let owner = self.protocol_owner_address_by_origin_name(origin)?;
        if caller != owner {
            return Err(AllowlistError::Unauthorized { caller, owner });
        }
        if self.entries.contains_key(origin) {
            return Err(AllowlistError::AlreadyRegistered(origin.to_string()));
        }
        let allowlist = self.template.clone_for(origin, owner);
        self.entries.insert(
            origin.to_string(),
            RegistryEntry {
                allowlist,
                finalized: false,
            },
        );
        info!("protocol_registration_started origin={origin} owner={owner}");
        Ok(())
    }

    /// Finalize `origin`'s Draft: requires a non-empty, fully valid rule
    /// set, flips the finalized flag, and appends the origin to the
    /// registered list exactly once.
    pub fn finish_protocol_registration(
        &mut self,
        caller: Address,
        origin: &str,
    ) -> Result<(), AllowlistError> {
        let entry = self
            .entries
            .get_mut(origin)
            .ok_or_else(|| AllowlistError::OriginNotRegistered(origin.to_string()))?;
        let owner = entry.allowlist.owner_address();
        if caller != owner {
            return Err(AllowlistError::Unauthorized { caller, owner });
        }
        if entry.finalized {
            return Err(AllowlistError::AlreadyRegistered(origin.to_string()));
        }
        if entry.allowlist.conditions_length() == 0 {
            return Err(AllowlistError::EmptyRuleSet(origin.to_string()));
        }
        entry.allowlist.validate_conditions()?;
        entry.finalized = true;
        let conditions = entry.allowlist.conditions_length();
        self.registered_origins.push(origin.to_string());
        info!("protocol_registration_finished origin={origin} conditions={conditions}");
        Ok(())
    }

    /// Atomically replace a finalized origin's entire rule set with
    /// `conditions`, applying full per-condition validation. Directory
    /// membership and the finalized flag are untouched.
    pub fn reregister_protocol(
        &mut self,
        caller: Address,
        origin: &str,
        conditions: Vec<Condition>,
    ) -> Result<(), AllowlistError> {
        let entry = self
            .entries
            .get_mut(origin)
            .ok_or_else(|| AllowlistError::OriginNotRegistered(origin.to_string()))?;
        if !entry.finalized {
            return Err(AllowlistError::OriginNotRegistered(origin.to_string()));
        }
        entry.allowlist.replace_conditions(caller, conditions)?;
        info!("protocol_reregistered origin={origin}");
        Ok(())
    }

    /// Instantiate a detached allowlist for `origin` from the template,
    /// owned by `owner_override` or the resolved protocol owner. The
    /// directory's registration state is not touched; this is the ad hoc
    /// creation path outside the registration lifecycle.
    pub fn clone_allowlist(
        &self,
        origin: &str,
        owner_override: Option<Address>,
    ) -> Result<Allowlist, AllowlistError> {
        let owner = match owner_override {
            Some(owner) => owner,
            None => self.protocol_owner_address_by_origin_name(origin)?,
        };
        Ok(self.template.clone_for(origin, owner))
    }

    /// Validate one call against the allowlist registered for `origin`.
    /// The only failure here is an origin with no instance at all;
    /// malformed or non-matching calldata is an `Ok(false)`.
    pub fn validate_calldata_by_origin(
        &self,
        origin: &str,
        target: Address,
        calldata: &[u8],
    ) -> Result<bool, AllowlistError> {
        let entry = self
            .entries
            .get(origin)
            .ok_or_else(|| AllowlistError::OriginNotRegistered(origin.to_string()))?;
        Ok(validator::validate_calldata(
            &entry.allowlist,
            target,
            calldata,
        ))
    }

    /// Origins that completed registration, in finalization order.
    pub fn registered_protocols_list(&self) -> Vec<String> {
        self.registered_origins.clone()
    }

    /// True iff `origin` has finished registration.
    pub fn registered_protocol(&self, origin: &str) -> bool {
        self.entries
            .get(origin)
            .map(|entry| entry.finalized)
            .unwrap_or(false)
    }

    /// The ordered condition list for `origin`'s instance.
    pub fn conditions_by_origin_name(
        &self,
        origin: &str,
    ) -> Result<Vec<Condition>, AllowlistError> {
        let entry = self
            .entries
            .get(origin)
            .ok_or_else(|| AllowlistError::OriginNotRegistered(origin.to_string()))?;
        Ok(entry.allowlist.conditions_list())
    }

    /// Borrow the instance recorded for `origin`, Draft or Finalized.
    pub fn allowlist_by_origin_name(&self, origin: &str) -> Option<&Allowlist> {
        self.entries.get(origin).map(|entry| &entry.allowlist)
    }

    /// Mutably borrow the instance recorded for `origin`. Mutation
    /// through the instance is still owner-gated by the engine itself.
    pub fn allowlist_mut_by_origin_name(&mut self, origin: &str) -> Option<&mut Allowlist> {
        self.entries.get_mut(origin).map(|entry| &mut entry.allowlist)
    }
}

#[cfg(test)]
mod tests {
    use super::AllowlistRegistry;
    use crate::allowlist::engine::Allowlist;
    use crate::domain::types::{Condition, Validation};
    use crate::error::AllowlistError;
    use crate::provider::{MockImplementation, StaticOwnerResolver};
    use alloy_primitives::Address;
    use std::sync::Arc;

    const ORIGIN: &str = "yearn.finance";
    const IMPLEMENTATION_ID: &str = "VAULT_VALIDATIONS";

    fn protocol_owner() -> Address {
        Address::repeat_byte(0xAA)
    }

    fn rando() -> Address {
        Address::repeat_byte(0xBB)
    }

    fn vault() -> Address {
        Address::repeat_byte(0x11)
    }

    fn condition(id: &str, capability: &str) -> Condition {
        Condition {
            id: id.to_string(),
            implementation_id: IMPLEMENTATION_ID.to_string(),
            method_name: "approve".to_string(),
            param_types: vec!["address".to_string(), "uint256".to_string()],
            validations: vec![Validation::TargetCheck {
                capability_name: capability.to_string(),
            }],
        }
    }

    fn template() -> Allowlist {
        let mut template = Allowlist::new("", Address::ZERO);
        let implementation = MockImplementation::new()
            .with_address_set("isVault", vec![vault()])
            .with_address_set("isVaultToken", vec![Address::repeat_byte(0x22)]);
        template
            .set_implementation(Address::ZERO, IMPLEMENTATION_ID, Arc::new(implementation))
            .expect("template implementation should persist");
        template
    }

    fn registry() -> AllowlistRegistry {
        let resolver = StaticOwnerResolver::new().with_origin(ORIGIN, protocol_owner());
        AllowlistRegistry::new(Arc::new(resolver), template())
    }

    #[test]
    fn owner_lookup_delegates_to_the_resolver() {
        let registry = registry();
        assert_eq!(
            registry
                .protocol_owner_address_by_origin_name(ORIGIN)
                .expect("origin should resolve"),
            protocol_owner()
        );
        assert_eq!(
            registry
                .protocol_owner_address_by_origin_name("random name")
                .expect_err("unresolvable origin must fail"),
            AllowlistError::OwnerNotResolved("random name".to_string())
        );
    }

    #[test]
    fn start_registration_gates_on_resolved_owner() {
        let mut registry = registry();

        let err = registry
            .start_protocol_registration(protocol_owner(), "random name")
            .expect_err("unresolvable origin must fail");
        assert!(matches!(err, AllowlistError::OwnerNotResolved(_)));

        let err = registry
            .start_protocol_registration(rando(), ORIGIN)
            .expect_err("non-owner must not register");
        assert!(matches!(err, AllowlistError::Unauthorized { .. }));

        registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect("owner should register");
        let allowlist = registry
            .allowlist_by_origin_name(ORIGIN)
            .expect("draft instance should exist");
        assert_eq!(allowlist.name(), ORIGIN);
        assert_eq!(allowlist.owner_address(), protocol_owner());

        let err = registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect_err("second start must fail");
        assert_eq!(err, AllowlistError::AlreadyRegistered(ORIGIN.to_string()));
    }

    #[test]
    fn finish_registration_requires_nonempty_valid_conditions() {
        let mut registry = registry();
        registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect("start should pass");

        let err = registry
            .finish_protocol_registration(protocol_owner(), ORIGIN)
            .expect_err("empty rule set must not finalize");
        assert_eq!(err, AllowlistError::EmptyRuleSet(ORIGIN.to_string()));

        let allowlist = registry
            .allowlist_mut_by_origin_name(ORIGIN)
            .expect("draft instance should exist");
        allowlist
            .add_condition(protocol_owner(), condition("TOKEN_APPROVE_VAULT", "isVaultToken"))
            .expect("valid condition should be admitted");
        allowlist
            .add_condition_without_validation(
                protocol_owner(),
                condition("TOKEN_APPROVE_INVALID", "missingValidationMethod"),
            )
            .expect("staged condition should be admitted");

        let err = registry
            .finish_protocol_registration(protocol_owner(), ORIGIN)
            .expect_err("staged invalid condition must block finalization");
        assert!(matches!(err, AllowlistError::InvalidConditionSet(_)));

        registry
            .allowlist_mut_by_origin_name(ORIGIN)
            .expect("draft instance should exist")
            .delete_condition(protocol_owner(), "TOKEN_APPROVE_INVALID")
            .expect("delete should pass");

        assert!(registry.registered_protocols_list().is_empty());
        assert!(!registry.registered_protocol(ORIGIN));
        registry
            .finish_protocol_registration(protocol_owner(), ORIGIN)
            .expect("finalization should pass");

        assert!(registry.registered_protocol(ORIGIN));
        assert_eq!(registry.registered_protocols_list(), vec![ORIGIN]);

        let err = registry
            .finish_protocol_registration(protocol_owner(), ORIGIN)
            .expect_err("finalization is one-shot");
        assert_eq!(err, AllowlistError::AlreadyRegistered(ORIGIN.to_string()));
        assert_eq!(registry.registered_protocols_list(), vec![ORIGIN]);
    }

    #[test]
    fn finish_registration_requires_the_instance_owner() {
        let mut registry = registry();
        registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect("start should pass");
        let err = registry
            .finish_protocol_registration(rando(), ORIGIN)
            .expect_err("non-owner must not finalize");
        assert!(matches!(err, AllowlistError::Unauthorized { .. }));
    }

    #[test]
    fn reregister_replaces_the_rule_set_of_a_finalized_origin() {
        let mut registry = registry();
        let batch = vec![
            condition("CONDITION_0", "isVaultToken"),
            condition("CONDITION_1", "isVaultToken"),
        ];

        let err = registry
            .reregister_protocol(protocol_owner(), ORIGIN, batch.clone())
            .expect_err("unregistered origin must fail");
        assert_eq!(err, AllowlistError::OriginNotRegistered(ORIGIN.to_string()));

        registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect("start should pass");

        let err = registry
            .reregister_protocol(protocol_owner(), ORIGIN, batch.clone())
            .expect_err("draft origin is not yet registered");
        assert_eq!(err, AllowlistError::OriginNotRegistered(ORIGIN.to_string()));

        registry
            .allowlist_mut_by_origin_name(ORIGIN)
            .expect("draft instance should exist")
            .add_condition(protocol_owner(), condition("OLD", "isVault"))
            .expect("seed condition should pass");
        registry
            .finish_protocol_registration(protocol_owner(), ORIGIN)
            .expect("finalization should pass");

        let err = registry
            .reregister_protocol(rando(), ORIGIN, batch.clone())
            .expect_err("non-owner must not reregister");
        assert!(matches!(err, AllowlistError::Unauthorized { .. }));

        registry
            .reregister_protocol(protocol_owner(), ORIGIN, batch.clone())
            .expect("owner reregistration should pass");
        assert_eq!(
            registry
                .conditions_by_origin_name(ORIGIN)
                .expect("conditions should list"),
            batch
        );
        assert!(registry.registered_protocol(ORIGIN));
        assert_eq!(registry.registered_protocols_list(), vec![ORIGIN]);
    }

    #[test]
    fn clone_allowlist_binds_resolved_or_overridden_owner() {
        let registry = registry();

        let cloned = registry
            .clone_allowlist(ORIGIN, None)
            .expect("clone should pass");
        assert_eq!(cloned.name(), ORIGIN);
        assert_eq!(cloned.owner_address(), protocol_owner());
        assert_eq!(cloned.implementations_ids_list(), vec![IMPLEMENTATION_ID]);

        let cloned = registry
            .clone_allowlist(ORIGIN, Some(rando()))
            .expect("clone with override should pass");
        assert_eq!(cloned.owner_address(), rando());

        // Ad hoc instances never touch the directory.
        assert!(!registry.registered_protocol(ORIGIN));
        assert!(registry.allowlist_by_origin_name(ORIGIN).is_none());

        let err = registry
            .clone_allowlist("random name", None)
            .expect_err("unresolvable origin without override must fail");
        assert!(matches!(err, AllowlistError::OwnerNotResolved(_)));
    }

    #[test]
    fn validate_calldata_by_origin_requires_an_instance() {
        let mut registry = registry();
        let err = registry
            .validate_calldata_by_origin(ORIGIN, vault(), &[0u8; 4])
            .expect_err("unregistered origin must fail");
        assert_eq!(err, AllowlistError::OriginNotRegistered(ORIGIN.to_string()));

        registry
            .start_protocol_registration(protocol_owner(), ORIGIN)
            .expect("start should pass");
        let allowed = registry
            .validate_calldata_by_origin(ORIGIN, vault(), &[0u8; 4])
            .expect("draft instance should validate");
        assert!(!allowed, "empty rule set matches nothing");
    }
}
