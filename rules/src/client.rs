//! Client State (spec §4.2): per-connected-client records, keyed by the
//! stable 32-bit client index, created on `client_put` and destroyed on
//! `client_unlink`.

use std::sync::{Arc, Mutex};

use nohash::{IntMap, IntSet};
use tokio::sync::oneshot;
use pulse_access_core::facility::ObjectKey;
use pulse_access_core::hook::HOOK_MAX;
use pulse_access_core::host::{ClientInfo, TimerFactory};
use pulse_access_core::policy::PolicyTable;

use crate::portal::PendingPortal;
use crate::sandbox::{KnownPolicies, SandboxClassifier};

/// `decision_cache[h]` from the spec: `granted` is only meaningful once
/// `checked` is true.
#[derive(Clone, Copy, Default, Debug)]
pub struct DecisionCacheEntry {
    pub checked: bool,
    pub granted: bool,
}

pub struct ClientRecord<H> {
    pub client_index: u32,
    pub policy_index: u32,
    pub pid: i32,
    pub seen_set: IntSet<ObjectKey>,
    pub decision_cache: [DecisionCacheEntry; HOOK_MAX],
    pub pending_request: Option<PendingPortal>,
    /// Set just before the timer created alongside this record is armed for a
    /// portal dialog; the timer's fixed callback (installed once, at
    /// `on_client_put`) takes this and sends through it when the host fires
    /// the deadline. `None` whenever no dialog is awaiting a timeout.
    pub timeout_tx: Option<oneshot::Sender<()>>,
    pub timer: H,
}

impl<H> ClientRecord<H> {
    fn new(client_index: u32, policy_index: u32, pid: i32, timer: H) -> Self {
        Self {
            client_index,
            policy_index,
            pid,
            seen_set: IntSet::default(),
            decision_cache: [DecisionCacheEntry::default(); HOOK_MAX],
            pending_request: None,
            timeout_tx: None,
            timer,
        }
    }
}

pub(crate) struct Inner<T: TimerFactory> {
    pub(crate) policies: Arc<PolicyTable>,
    pub(crate) known: KnownPolicies,
    pub(crate) timers: T,
    pub(crate) clients: IntMap<u32, ClientRecord<T::Handle>>,
}

/// Owns every live [`ClientRecord`], shared (via `Arc<Mutex<_>>`, the same
/// shared-state idiom this codebase already uses for state touched from both
/// the main callback sequence and a spawned async task — see the tray
/// watcher's `Arc<RwLock<_>>` tables) between the hook orchestrator and the
/// portal coordinator's spawned consent-dialog tasks.
pub struct ClientState<T: TimerFactory> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: TimerFactory> Clone for ClientState<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: TimerFactory> ClientState<T> {
    pub fn new(policies: Arc<PolicyTable>, known: KnownPolicies, timers: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                policies,
                known,
                timers,
                clients: IntMap::default(),
            })),
        }
    }

    /// `on_client_put`: classify and create the record, allocating a dormant
    /// timer for the eventual portal-timeout use.
    pub fn on_client_put(&self, info: ClientInfo) {
        let mut inner = self.inner.lock().unwrap();

        let policy_index = SandboxClassifier::classify(&inner.known, info.credentials_valid, info.pid);

        let state_for_timer = self.clone();
        let client_index = info.index;
        let timer = inner
            .timers
            .create(Box::new(move || state_for_timer.fire_timeout(client_index)));

        let record = ClientRecord::new(info.index, policy_index, info.pid, timer);
        log::debug!(
            "client {} connected, pid={}, policy={}",
            info.index, info.pid, policy_index
        );

        inner.clients.insert(info.index, record);
    }

    /// `on_client_auth` / `on_client_proplist_changed`: re-run sandbox
    /// classification now that credentials/properties may be trustworthy.
    pub fn reclassify(&self, info: ClientInfo) {
        let mut inner = self.inner.lock().unwrap();
        let policy_index = SandboxClassifier::classify(&inner.known, info.credentials_valid, info.pid);

        if let Some(record) = inner.clients.get_mut(&info.index) {
            if record.policy_index != policy_index {
                log::debug!(
                    "client {} reclassified: policy {} -> {}",
                    info.index, record.policy_index, policy_index
                );
            }
            record.policy_index = policy_index;
        }
    }

    /// `on_client_unlink`: destroy the record, cancelling any pending portal
    /// dialog and the timer atomically with the removal.
    pub fn on_client_unlink(&self, client_index: u32) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(mut record) = inner.clients.remove(&client_index) {
            if let Some(pending) = record.pending_request.take() {
                pending.cancel();
            }

            inner.timers.disarm(&record.timer);
            inner.timers.destroy(record.timer);
            log::debug!("client {client_index} disconnected");
        }
    }

    /// Invoked from the host's timer facility when a client's timer deadline
    /// elapses. Delivers to whichever portal dialog is currently waiting on
    /// it, if any; a no-op otherwise (the timer may fire after the dialog it
    /// was armed for already resolved via the `Response` signal).
    fn fire_timeout(&self, client_index: u32) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(record) = inner.clients.get_mut(&client_index) {
            if let Some(tx) = record.timeout_tx.take() {
                let _ = tx.send(());
            }
        }
    }

    #[inline]
    pub fn policies(&self) -> Arc<PolicyTable> {
        self.inner.lock().unwrap().policies.clone()
    }

    /// Run `f` with exclusive access to the whole client map plus the
    /// read-only policy table, timer factory and known-policy indices. `f`
    /// does its own `inner.clients.get_mut(...)` — disjoint-field access on
    /// `Inner` lets it reach both a specific record and the shared fields at
    /// once without any unsafe code.
    pub fn with_inner<R>(&self, f: impl FnOnce(&mut Inner<T>) -> R) -> R {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner)
    }

    pub fn policy_index_of(&self, client_index: u32) -> Option<u32> {
        self.inner
            .lock()
            .unwrap()
            .clients
            .get(&client_index)
            .map(|r| r.policy_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTimerFactory;

    fn policies_with_default_and_portal() -> (Arc<PolicyTable>, KnownPolicies) {
        use pulse_access_core::hook::AccessHookKind;
        use pulse_access_core::policy::Rule;

        let mut table = PolicyTable::new();
        let default = table.create_policy(Rule::Allow);
        let portal = table.create_policy(Rule::Allow);
        table.set_rule(portal, AccessHookKind::ConnectPlayback, Rule::CheckPortal);

        (Arc::new(table), KnownPolicies { default_policy: default, portal_policy: portal })
    }

    #[test]
    fn put_then_unlink_round_trips_through_the_client_map() {
        let (policies, known) = policies_with_default_and_portal();
        let state = ClientState::new(policies, known, FakeTimerFactory::default());

        state.on_client_put(ClientInfo { index: 7, pid: 1234, credentials_valid: true });
        assert_eq!(state.policy_index_of(7), Some(known.default_policy));

        state.on_client_unlink(7);
        assert_eq!(state.policy_index_of(7), None);
    }

    #[test]
    fn unlink_of_unknown_client_is_a_no_op() {
        let (policies, known) = policies_with_default_and_portal();
        let state = ClientState::new(policies, known, FakeTimerFactory::default());

        state.on_client_unlink(999);
    }
}
