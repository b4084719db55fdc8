//! Rule Engine (spec §4.4): the built-in rules other than `check_portal`,
//! which is stateful/asynchronous enough to live in its own module (see
//! [`crate::portal`]).

use pulse_access_core::hook::{AccessHookKind, AccessRequest};
use pulse_access_core::host::ObjectRegistry;
use pulse_access_core::verdict::Verdict;

#[inline]
pub fn allow(request: &AccessRequest) -> Verdict {
    log::debug!(
        "allow: client {} hook {:?} object {}",
        request.client_index, request.hook, request.object_index
    );

    Verdict::Ok
}

#[inline]
pub fn block(request: &AccessRequest) -> Verdict {
    log::debug!(
        "block: client {} hook {:?} object {}",
        request.client_index, request.hook, request.object_index
    );

    Verdict::Stop
}

/// OK iff the requesting client owns the target object.
///
/// - `get_client_info`/`kill_client`: the object *is* the client.
/// - Sink-input hooks: owner is the sink-input's recorded client, via the
///   object registry; absent owner ⇒ STOP.
/// - Source-output hooks: symmetric.
/// - Anything else: STOP (conservative default — this rule was never meant
///   to apply to hooks without an obvious single owner).
pub fn check_owner(request: &AccessRequest, objects: &impl ObjectRegistry) -> Verdict {
    let owner = match request.hook {
        AccessHookKind::GetClientInfo | AccessHookKind::KillClient => Some(request.object_index),
        hook if hook.is_sink_input_op() => objects.sink_input_owner(request.object_index),
        hook if hook.is_source_output_op() => objects.source_output_owner(request.object_index),
        _ => None,
    };

    match owner {
        Some(owner) if owner == request.client_index => Verdict::Ok,
        Some(_) => Verdict::Stop,
        None => {
            log::debug!(
                "check_owner: no owner found for hook {:?} object {}, denying",
                request.hook, request.object_index
            );

            Verdict::Stop
        }
    }
}
