//! Mock host collaborators used across this crate's unit tests. Kept as a
//! `#[cfg(test)]` module rather than a separate test-only crate, matching the
//! scale of this module (see `ClientInfo`/`ObjectRegistry`/etc. in
//! `pulse_access_core::host`).

use std::collections::HashMap;
use std::time::Duration;

use pulse_access_core::hook::{AccessHookKind, AccessRequest};
use pulse_access_core::host::{ClientInfo, ClientRegistry, HookBus, HookCallback, ObjectRegistry, Priority, TimerFactory};
use pulse_access_core::verdict::Verdict;

use crate::portal::PortalCheck;

/// Stands in for the timed-callback facility. `arm`/`disarm` only record the
/// most recent deadline; a test fires a timeout explicitly via [`Self::fire`]
/// rather than waiting on a real clock.
#[derive(Default)]
pub struct FakeTimerFactory {
    next_id: u64,
    pending: HashMap<u64, Box<dyn FnOnce() + Send>>,
    armed: HashMap<u64, Duration>,
}

impl TimerFactory for FakeTimerFactory {
    type Handle = u64;

    fn create(&mut self, callback: Box<dyn FnOnce() + Send>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, callback);
        id
    }

    fn arm(&mut self, handle: &u64, deadline: Duration) {
        self.armed.insert(*handle, deadline);
    }

    fn disarm(&mut self, handle: &u64) {
        self.armed.remove(handle);
    }

    fn destroy(&mut self, handle: u64) {
        self.pending.remove(&handle);
        self.armed.remove(&handle);
    }
}

impl FakeTimerFactory {
    /// Simulate the host's main loop reaching a timer's deadline. A no-op if
    /// the handle was never armed or was already disarmed/destroyed.
    pub fn fire(&mut self, handle: &u64) {
        if self.armed.remove(handle).is_none() {
            return;
        }

        if let Some(callback) = self.pending.remove(handle) {
            callback();
        }
    }

    pub fn is_armed(&self, handle: &u64) -> bool {
        self.armed.contains_key(handle)
    }
}

/// Stands in for the object-lookup facility `check_owner` consults.
#[derive(Default)]
pub struct FakeObjectRegistry {
    sink_input_owners: HashMap<u32, u32>,
    source_output_owners: HashMap<u32, u32>,
}

impl FakeObjectRegistry {
    pub fn set_sink_input_owner(&mut self, object_index: u32, client_index: u32) {
        self.sink_input_owners.insert(object_index, client_index);
    }

    pub fn set_source_output_owner(&mut self, object_index: u32, client_index: u32) {
        self.source_output_owners.insert(object_index, client_index);
    }
}

impl ObjectRegistry for FakeObjectRegistry {
    fn sink_input_owner(&self, object_index: u32) -> Option<u32> {
        self.sink_input_owners.get(&object_index).copied()
    }

    fn source_output_owner(&self, object_index: u32) -> Option<u32> {
        self.source_output_owners.get(&object_index).copied()
    }
}

/// Stands in for the client registry's read side.
#[derive(Default)]
pub struct FakeClientRegistry {
    clients: HashMap<u32, ClientInfo>,
}

impl FakeClientRegistry {
    pub fn insert(&mut self, info: ClientInfo) {
        self.clients.insert(info.index, info);
    }
}

impl ClientRegistry for FakeClientRegistry {
    fn client_info(&self, client_index: u32) -> Option<ClientInfo> {
        self.clients.get(&client_index).copied()
    }
}

/// Stands in for the host's hook-registration facility. `fire` simulates the
/// host invoking whichever handler is currently registered for a hook kind —
/// the real host calls the callback directly, so there's no separate `fire`
/// method on the [`HookBus`] trait itself.
#[derive(Default)]
pub struct FakeHookBus {
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
    pub fn fire(&mut self, hook: AccessHookKind, request: AccessRequest) -> Option<Verdict> {
        self.handlers
            .values_mut()
            .find(|(registered, _)| *registered == hook)
            .map(|(_, callback)| callback(request))
    }

    pub fn registered_count(&self) -> usize {
        self.handlers.len()
    }
}

/// A `check_portal` stand-in that always resolves to a fixed verdict,
/// recording how many times it was asked. Used to verify the orchestrator
/// routes `Rule::CheckPortal` here without needing a live D-Bus connection.
pub struct FakePortal {
    verdict: std::sync::Mutex<Verdict>,
    calls: std::sync::atomic::AtomicUsize,
}

impl FakePortal {
    pub fn new(verdict: Verdict) -> Self {
        Self { verdict: std::sync::Mutex::new(verdict), calls: std::sync::atomic::AtomicUsize::new(0) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl PortalCheck for FakePortal {
    fn check_portal(&self, _request: AccessRequest) -> Verdict {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.verdict.lock().unwrap()
    }
}
