//! Shared data structures for the insight pipeline
//!
//! - Input: Ticket, TicketMessage (helpdesk export)
//! - Phase 1: DiscoveryResult
//! - Phase 2: HypothesisSet, BusinessContext
//! - Phase 3: TargetedAnalysis
//! - Per-entity: AgentForecast
//! - AnalysisResult: tagged union of all of the above, as cached

mod analysis;
mod discovery;
mod forecast;
mod hypothesis;
mod targeted;
mod ticket;

pub use analysis::*;
pub use discovery::*;
pub use forecast::*;
pub use hypothesis::*;
pub use targeted::*;
pub use ticket::*;
