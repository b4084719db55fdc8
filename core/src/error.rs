use thiserror::Error;

use crate::hook::AccessHookKind;

/// Internal error vocabulary. Never surfaced across the hook boundary as an
/// exception — every public entry point still resolves to a `Verdict` per the
/// spec's propagation policy — but every failure path gets one precise,
/// loggable shape instead of an ad hoc string.
#[derive(Error, Debug)]
pub enum AccessControlError {
    #[error("portal transport error: {0}")]
    PortalTransport(String),

    #[error("failed to subscribe to the portal Response signal: {0}")]
    SignalSubscription(String),

    #[error("couldn't read sandbox cgroup info: {0}")]
    SandboxProbe(#[from] std::io::Error),

    #[error("hook fired for unknown client {0}")]
    UnknownClient(u32),

    #[error("check_portal has no device mapping for {0}")]
    UnmappedHook(AccessHookKind),
}
