//! Traits for the facilities this module consumes from the host rather than
//! implements itself: hook registration, the object registries for
//! sinks/sources/etc., the client registry, and a timed-callback facility.
//! None of these are implemented in this workspace — the host server (out of
//! scope per the spec) provides them; the `#[cfg(test)]` fakes under
//! `pulse-access-rules` stand in for tests.

use std::time::Duration;

use crate::hook::{AccessHookKind, AccessRequest};
use crate::verdict::Verdict;

/// Hook registrations all happen at the same priority in this module, but the
/// host's hook bus supports ordering several modules' handlers relative to
/// each other, so the type stays open rather than being erased to `()`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Priority {
    Early,
}

pub type HookCallback = Box<dyn FnMut(AccessRequest) -> Verdict + Send>;

/// The hook-registration facility: `register`/`unregister` as in the spec.
/// `fire` is deliberately absent — the host calls the registered callback
/// directly, this module never calls `fire` on itself.
pub trait HookBus {
    type Slot;

    fn register(
        &mut self,
        hook: AccessHookKind,
        priority: Priority,
        callback: HookCallback,
    ) -> Self::Slot;

    fn unregister(&mut self, slot: Self::Slot);
}

/// Per-client facts the client registry exposes on demand.
#[derive(Clone, Copy, Debug)]
pub struct ClientInfo {
    pub index: u32,
    pub pid: i32,
    pub credentials_valid: bool,
}

/// The client-registry facility's read side. The lifecycle events
/// (`client_put`/`client_auth`/`client_proplist_changed`/`client_unlink`)
/// aren't [`AccessHookKind`] variants and so can't go through [`HookBus`];
/// the orchestrator exposes them as direct methods instead (`on_client_put`
/// and friends) and the host calls those directly, the same way it would
/// call a hook callback.
pub trait ClientRegistry {
    fn client_info(&self, client_index: u32) -> Option<ClientInfo>;
}

/// The object-lookup facility, keyed by the stable 32-bit indices the spec
/// assumes throughout. Only the two lookups `check_owner` needs are in
/// scope; the full sink/source/etc. registries are out of scope.
pub trait ObjectRegistry {
    fn sink_input_owner(&self, object_index: u32) -> Option<u32>;
    fn source_output_owner(&self, object_index: u32) -> Option<u32>;
}

/// The timed-callback facility. `Handle` is opaque to this module; it is
/// only ever round-tripped back into `arm`/`disarm`/`destroy`.
pub trait TimerFactory {
    type Handle;

    fn create(&mut self, callback: Box<dyn FnOnce() + Send>) -> Self::Handle;
    fn arm(&mut self, handle: &Self::Handle, deadline: Duration);
    fn disarm(&mut self, handle: &Self::Handle);
    fn destroy(&mut self, handle: Self::Handle);
}
