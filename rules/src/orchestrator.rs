//! Hook Orchestrator (spec §4.7): registers one handler per
//! [`AccessHookKind`], dispatches into the rule engine, the event visibility
//! filter, or the portal coordinator, and forwards client lifecycle events
//! into [`ClientState`].

use std::sync::Arc;

use smallvec::SmallVec;

use pulse_access_core::hook::{AccessHookKind, AccessRequest, HOOK_MAX};
use pulse_access_core::host::{ClientInfo, HookBus, HookCallback, ObjectRegistry, Priority, TimerFactory};
use pulse_access_core::policy::{PolicyTable, Rule};
use pulse_access_core::verdict::Verdict;

/// Every hook registration fits this inline, so tearing a module down never
/// needs a heap allocation just to hold the slots (see the teacher's
/// `widget_tree.rs` for the same small-fixed-capacity idiom).
pub type HookSlots<S> = SmallVec<[S; HOOK_MAX]>;

use crate::client::ClientState;
use crate::portal::PortalCheck;
use crate::rule_engine;
use crate::visibility;

/// Owns no state of its own beyond shared handles to the components it
/// dispatches into; cheap to clone so each hook registration gets its own
/// closure without sharing mutable access through a `Box<dyn ...>` vtable.
pub struct HookOrchestrator<T: TimerFactory, O, P> {
    policies: Arc<PolicyTable>,
    client_state: ClientState<T>,
    objects: Arc<O>,
    portal: Arc<P>,
}

impl<T: TimerFactory, O, P> Clone for HookOrchestrator<T, O, P> {
    fn clone(&self) -> Self {
        Self {
            policies: Arc::clone(&self.policies),
            client_state: self.client_state.clone(),
            objects: Arc::clone(&self.objects),
            portal: Arc::clone(&self.portal),
        }
    }
}

impl<T, O, P> HookOrchestrator<T, O, P>
where
    T: TimerFactory + Send + 'static,
    T::Handle: Send + 'static,
    O: ObjectRegistry + Send + Sync + 'static,
    P: PortalCheck + Send + Sync + 'static,
{
    pub fn new(
        policies: Arc<PolicyTable>,
        client_state: ClientState<T>,
        objects: Arc<O>,
        portal: Arc<P>,
    ) -> Self {
        Self { policies, client_state, objects, portal }
    }

    /// `check_access` from the spec: look up the client's policy, dispatch to
    /// the rule it maps `request.hook` to. Unknown client or unknown policy
    /// index both deny conservatively.
    pub fn check_access(&self, request: AccessRequest) -> Verdict {
        let client_index = request.client_index;

        let Some(policy_index) = self.client_state.policy_index_of(client_index) else {
            log::debug!("check_access: client {client_index} unknown, denying");
            return Verdict::Stop;
        };

        let Some(rule) = self.policies.get_rule(policy_index, request.hook) else {
            log::warn!(
                "check_access: client {client_index} has invalid policy index {policy_index}, denying"
            );
            return Verdict::Stop;
        };

        match rule {
            Rule::Allow => rule_engine::allow(&request),
            Rule::Block => rule_engine::block(&request),
            Rule::CheckOwner => rule_engine::check_owner(&request, self.objects.as_ref()),
            Rule::CheckPortal => self.portal.check_portal(request),
        }
    }

    /// Routes `filter_subscribe_event` through the event visibility filter,
    /// re-entering `check_access` with a synthesized info-query hook whenever
    /// the filter needs to learn whether the client may see the object.
    pub fn filter_subscribe_event(&self, request: AccessRequest) -> Verdict {
        let AccessRequest { client_index, object_index, event, .. } = request;
        let orchestrator = self.clone();

        visibility::filter_event(&self.client_state, client_index, object_index, event, move |facility, object_index| {
            orchestrator.check_access(AccessRequest::new(facility.info_hook(), client_index, object_index))
        })
    }

    pub fn on_client_put(&self, info: ClientInfo) {
        self.client_state.on_client_put(info);
    }

    pub fn on_client_auth(&self, info: ClientInfo) {
        self.client_state.reclassify(info);
    }

    pub fn on_client_proplist_changed(&self, info: ClientInfo) {
        self.client_state.reclassify(info);
    }

    pub fn on_client_unlink(&self, client_index: u32) {
        self.client_state.on_client_unlink(client_index);
    }

    /// Registers one handler per [`AccessHookKind`] at [`Priority::Early`],
    /// `filter_subscribe_event` routed to the visibility filter and every
    /// other hook routed to `check_access`. Returns the slots so the caller
    /// can tear them down in reverse order at module `done`.
    pub fn register_hooks<B: HookBus>(&self, bus: &mut B) -> HookSlots<B::Slot> {
        AccessHookKind::ALL
            .into_iter()
            .map(|hook| {
                let orchestrator = self.clone();

                let callback: HookCallback = if hook == AccessHookKind::FilterSubscribeEvent {
                    Box::new(move |request| orchestrator.filter_subscribe_event(request))
                } else {
                    Box::new(move |request| orchestrator.check_access(request))
                };

                bus.register(hook, Priority::Early, callback)
            })
            .collect()
    }

    /// Tears down hook registrations in reverse order, per spec §4.7.
    pub fn unregister_hooks<B: HookBus>(&self, bus: &mut B, slots: HookSlots<B::Slot>) {
        for slot in slots.into_iter().rev() {
            bus.unregister(slot);
        }
    }
}
