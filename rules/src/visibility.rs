//! Event Visibility Filter (spec §4.5): filters subscription events so a
//! client only ever learns about objects it could also learn about through
//! an info-query hook, and keeps each client's "seen set" consistent with
//! what it has actually been told.

use pulse_access_core::facility::{decode_event_mask, EventType, Facility, ObjectKey};
use pulse_access_core::host::TimerFactory;
use pulse_access_core::verdict::Verdict;

use crate::client::ClientState;

/// `re_check`: synthesizes and re-enters the equivalent `get_*_info` hook for
/// `facility`/`object_index`, returning whatever verdict the full hook
/// machinery (policy lookup, rule engine) produces for it. Passed in rather
/// than called directly so this module doesn't need to depend on the
/// orchestrator that owns `check_access`.
pub fn filter_event<T: TimerFactory>(
    client_state: &ClientState<T>,
    client_index: u32,
    object_index: u32,
    mask: u32,
    mut re_check: impl FnMut(Facility, u32) -> Verdict,
) -> Verdict {
    let Some((facility, event)) = decode_event_mask(mask) else {
        log::debug!("filter_subscribe_event: unrecognized mask {mask:#x}, denying");
        return Verdict::Stop;
    };

    let key = ObjectKey::new(facility, object_index);

    let admitted = client_state.with_inner(|inner| {
        let Some(record) = inner.clients.get_mut(&client_index) else {
            return None;
        };

        Some(match event {
            EventType::Remove => {
                if record.seen_set.remove(&key) {
                    Some(true)
                } else {
                    Some(false)
                }
            }
            EventType::Change if record.seen_set.contains(&key) => Some(true),
            _ => None,
        })
    });

    match admitted {
        None => {
            log::debug!("filter_subscribe_event: client {client_index} unknown, denying");
            Verdict::Stop
        }
        Some(Some(decided)) => Verdict::from_granted(decided),
        Some(None) => {
            // NEW, or CHANGE not yet seen: fall through to synthesizing the
            // info-query hook below.
            let verdict = re_check(facility, object_index);

            if verdict == Verdict::Ok {
                client_state.with_inner(|inner| {
                    if let Some(record) = inner.clients.get_mut(&client_index) {
                        record.seen_set.insert(key);
                    }
                });
            }

            verdict
        }
    }
}
