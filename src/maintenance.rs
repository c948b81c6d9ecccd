//! Read-path index maintenance.
//!
//! Searches find out that an index entry is stale only when they resolve
//! it against the row store. The [`ConsistencyGuard`] decides which
//! corrective delete to issue and hands it to an [`IndexMaintenance`]
//! sink, normally the [`BackgroundRepairer`].

pub mod consistency;
pub mod worker;

pub use consistency::{ConsistencyGuard, GuardOutcome, IndexMaintenance, RepairTask};
pub use worker::BackgroundRepairer;
