//! Cross-domain coordination engine.
//!
//! Turns an impact analysis into a phased coordination plan, executes the
//! phases against an injected [`domainsync_core::DomainUpdater`] and rolls
//! back best-effort when a phase fails or the run budget expires.

pub mod coordinator;
pub mod phases;
pub mod resources;
pub mod strategy;

pub use coordinator::CrossDomainCoordinator;
pub use resources::ResourceRegistry;
