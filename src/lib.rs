//! Thin façade over the access-control core (spec §2.1). Owns construction
//! of the policy table, client state, and hook orchestrator, and exposes the
//! `init`/`done` entry points a host module loader would call. Contains no
//! algorithms of its own — `pulse-access-core` holds the data model and
//! host-collaborator traits, `pulse-access-rules` holds every stateful
//! subsystem.

use std::sync::Arc;

use pulse_access_core::hook::AccessHookKind;
use pulse_access_core::host::{ClientInfo, HookBus, ObjectRegistry, TimerFactory};
use pulse_access_core::policy::{PolicyTable, Rule};
use pulse_access_rules::{ClientState, HookOrchestrator, HookSlots, KnownPolicies, PortalCheck};

/// The module's init-time configuration knobs (spec §1.1): the portal bus
/// endpoints and the pending-dialog timeout policy. There is no file-based or
/// environment-variable configuration — policies are established once, at
/// construction, per the spec's exclusion of dynamic reconfiguration.
///
/// The endpoints/timeout values themselves live on [`pulse_access_rules::PortalEndpoints`]
/// and [`pulse_access_rules::PortalTimeoutConfig`]; this struct exists so a
/// caller building a concrete `PortalCoordinator` has one place to source
/// both from, instead of threading two unrelated structs through `main`.
/// A host binary wires it into [`AccessControl::new`]'s `build_portal`
/// closure alongside the `zbus::Connection` and async runtime handle this
/// crate deliberately knows nothing about:
///
/// ```ignore
/// let config = AccessControlConfig::default();
/// let control = AccessControl::new(timer_factory, Arc::new(object_registry), |client_state| {
///     PortalCoordinator::new(conn, config.portal_endpoints, config.portal_timeout, client_state, runtime_handle)
/// });
/// ```
#[derive(Clone, Debug, Default)]
pub struct AccessControlConfig {
    pub portal_endpoints: pulse_access_rules::PortalEndpoints,
    pub portal_timeout: pulse_access_rules::PortalTimeoutConfig,
}

/// Hooks whose rule the portal policy overrides to `check_portal` (spec
/// §4.1): the three operations that reach a physical input/output device.
const PORTAL_GATED_HOOKS: [AccessHookKind; 3] = [
    AccessHookKind::PlaySample,
    AccessHookKind::ConnectPlayback,
    AccessHookKind::ConnectRecord,
];

/// Hooks whose owner is the subject client or object itself, gated by
/// `check_owner` on both built-in policies (spec §4.1, §4.4).
const OWNER_CHECKED_HOOKS: [AccessHookKind; 12] = [
    AccessHookKind::GetClientInfo,
    AccessHookKind::KillClient,
    AccessHookKind::GetSinkInputInfo,
    AccessHookKind::MoveSinkInput,
    AccessHookKind::SetSinkInputVolume,
    AccessHookKind::SetSinkInputMute,
    AccessHookKind::KillSinkInput,
    AccessHookKind::GetSourceOutputInfo,
    AccessHookKind::MoveSourceOutput,
    AccessHookKind::SetSourceOutputVolume,
    AccessHookKind::SetSourceOutputMute,
    AccessHookKind::KillSourceOutput,
];

/// Builds the two well-known policies the spec creates at init: a default
/// policy for trusted local clients and a portal policy for sandboxed ones.
/// Their rule tables are identical except for the three device hooks.
fn install_builtin_policies(table: &mut PolicyTable) -> KnownPolicies {
    let default_policy = table.create_policy(Rule::Allow);
    let portal_policy = table.create_policy(Rule::Allow);

    for &hook in &OWNER_CHECKED_HOOKS {
        table.set_rule(default_policy, hook, Rule::CheckOwner);
        table.set_rule(portal_policy, hook, Rule::CheckOwner);
    }

    for &hook in &PORTAL_GATED_HOOKS {
        table.set_rule(portal_policy, hook, Rule::CheckPortal);
    }

    KnownPolicies { default_policy, portal_policy }
}

/// The assembled access-control core. Generic over the host's timer,
/// object-registry and portal-check collaborators so this crate never needs
/// to depend on any one transport or async runtime directly — the caller
/// supplies concrete implementations (e.g. `pulse_access_rules::PortalCoordinator`
/// wired to a real `zbus::Connection`, or a fake for tests).
pub struct AccessControl<T: TimerFactory, O, P> {
    policies: Arc<PolicyTable>,
    orchestrator: HookOrchestrator<T, O, P>,
}

impl<T, O, P> AccessControl<T, O, P>
where
    T: TimerFactory + Send + 'static,
    T::Handle: Send + 'static,
    O: ObjectRegistry + Send + Sync + 'static,
    P: PortalCheck + Send + Sync + 'static,
{
    /// Constructs the policy table and client state and wires them into a
    /// hook orchestrator. Nothing is registered with a host hook bus yet —
    /// call [`Self::init`] for that.
    ///
    /// `build_portal` receives the freshly-constructed [`ClientState`] and
    /// returns the `check_portal` collaborator — a real
    /// `pulse_access_rules::PortalCoordinator` needs that exact `ClientState`
    /// to arm per-client timers and read the decision cache, so it can't be
    /// built before this point; a test can ignore the argument and return a
    /// fixed-verdict fake instead.
    pub fn new(timers: T, objects: Arc<O>, build_portal: impl FnOnce(ClientState<T>) -> P) -> Self {
        let mut table = PolicyTable::new();
        let known = install_builtin_policies(&mut table);
        let policies = Arc::new(table);

        let client_state = ClientState::new(Arc::clone(&policies), known, timers);
        let portal = Arc::new(build_portal(client_state.clone()));
        let orchestrator = HookOrchestrator::new(Arc::clone(&policies), client_state, objects, portal);

        Self { policies, orchestrator }
    }

    #[inline]
    pub fn policies(&self) -> &Arc<PolicyTable> {
        &self.policies
    }

    /// Module init entry point: registers one handler per [`AccessHookKind`]
    /// with the host's hook bus at early priority. The returned slots must be
    /// handed back to [`Self::done`] at module teardown.
    pub fn init<B: HookBus>(&self, bus: &mut B) -> HookSlots<B::Slot> {
        self.orchestrator.register_hooks(bus)
    }

    /// Module done entry point: tears down every hook registration `init`
    /// installed, in reverse order, per spec §4.7.
    pub fn done<B: HookBus>(&self, bus: &mut B, slots: HookSlots<B::Slot>) {
        self.orchestrator.unregister_hooks(bus, slots);
    }

    pub fn on_client_put(&self, info: ClientInfo) {
        self.orchestrator.on_client_put(info);
    }

    pub fn on_client_auth(&self, info: ClientInfo) {
        self.orchestrator.on_client_auth(info);
    }

    pub fn on_client_proplist_changed(&self, info: ClientInfo) {
        self.orchestrator.on_client_proplist_changed(info);
    }

    pub fn on_client_unlink(&self, client_index: u32) {
        self.orchestrator.on_client_unlink(client_index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_access_core::hook::AccessRequest;
    use pulse_access_core::host::{HookCallback, Priority};
    use pulse_access_core::verdict::Verdict;
    use std::collections::HashMap;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeTimerFactory {
        next_id: u64,
    }

    impl TimerFactory for FakeTimerFactory {
        type Handle = u64;

        fn create(&mut self, _callback: Box<dyn FnOnce() + Send>) -> u64 {
            let id = self.next_id;
            self.next_id += 1;
            id
        }

        fn arm(&mut self, _handle: &u64, _deadline: Duration) {}
        fn disarm(&mut self, _handle: &u64) {}
        fn destroy(&mut self, _handle: u64) {}
    }

    #[derive(Default)]
    struct FakeObjectRegistry {
        sink_input_owners: HashMap<u32, u32>,
    }

    impl ObjectRegistry for FakeObjectRegistry {
        fn sink_input_owner(&self, object_index: u32) -> Option<u32> {
            self.sink_input_owners.get(&object_index).copied()
        }

        fn source_output_owner(&self, _object_index: u32) -> Option<u32> {
            None
        }
    }

    struct FakePortal;

    impl PortalCheck for FakePortal {
        fn check_portal(&self, _request: AccessRequest) -> Verdict {
            Verdict::Cancel
        }
    }

    #[derive(Default)]
    struct FakeHookBus {
        next_slot: u64,
        handlers: HashMap<u64, (AccessHookKind, HookCallback)>,
    }

    impl HookBus for FakeHookBus {
        type Slot = u64;

        fn register(&mut self, hook: AccessHookKind, _priority: Priority, callback: HookCallback) -> u64 {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.handlers.insert(slot, (hook, callback));

            slot
        }

        fn unregister(&mut self, slot: u64) {
            self.handlers.remove(&slot);
        }
    }

    impl FakeHookBus {
        fn fire(&mut self, hook: AccessHookKind, request: AccessRequest) -> Option<Verdict> {
            self.handlers
                .values_mut()
                .find(|(registered, _)| *registered == hook)
                .map(|(_, callback)| callback(request))
        }
    }

    fn access_control() -> AccessControl<FakeTimerFactory, FakeObjectRegistry, FakePortal> {
        AccessControl::new(FakeTimerFactory::default(), Arc::new(FakeObjectRegistry::default()), |_client_state| FakePortal)
    }

    #[test]
    fn builtin_policies_differ_only_on_the_three_device_hooks() {
        let control = access_control();
        let policies = control.policies();
        let default = policies.get(0).unwrap();
        let portal = policies.get(1).unwrap();

        for hook in AccessHookKind::ALL {
            let is_device_hook = PORTAL_GATED_HOOKS.contains(&hook);

            if is_device_hook {
                assert_eq!(default.rule(hook), Rule::Allow);
                assert_eq!(portal.rule(hook), Rule::CheckPortal);
            } else {
                assert_eq!(default.rule(hook), portal.rule(hook));
            }
        }
    }

    #[test]
    fn init_registers_every_hook_and_done_tears_them_all_down() {
        let control = access_control();
        let mut bus = FakeHookBus::default();

        let slots = control.init(&mut bus);
        assert_eq!(slots.len(), pulse_access_core::hook::HOOK_MAX);
        assert_eq!(bus.handlers.len(), pulse_access_core::hook::HOOK_MAX);

        control.done(&mut bus, slots);
        assert!(bus.handlers.is_empty());
    }

    #[test]
    fn trusted_client_can_query_sink_info_end_to_end() {
        let control = access_control();
        let mut bus = FakeHookBus::default();
        control.init(&mut bus);

        control.on_client_put(ClientInfo { index: 7, pid: std::process::id() as i32, credentials_valid: true });

        let verdict = bus.fire(AccessHookKind::GetSinkInfo, AccessRequest::new(AccessHookKind::GetSinkInfo, 7, 3));

        assert_eq!(verdict, Some(Verdict::Ok));
    }

    #[test]
    fn unlinked_client_is_denied_afterwards() {
        let control = access_control();
        let mut bus = FakeHookBus::default();
        control.init(&mut bus);

        control.on_client_put(ClientInfo { index: 7, pid: std::process::id() as i32, credentials_valid: true });
        control.on_client_unlink(7);

        let verdict = bus.fire(AccessHookKind::GetSinkInfo, AccessRequest::new(AccessHookKind::GetSinkInfo, 7, 3));

        assert_eq!(verdict, Some(Verdict::Stop));
    }
}
