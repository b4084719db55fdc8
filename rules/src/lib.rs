pub mod client;
pub mod sandbox;
pub mod rule_engine;
pub mod visibility;
pub mod portal;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{ClientRecord, ClientState};
pub use orchestrator::{HookOrchestrator, HookSlots};
pub use portal::{PortalCheck, PortalCoordinator, PortalEndpoints, PortalTimeoutConfig};
pub use sandbox::{KnownPolicies, SandboxClassifier};
