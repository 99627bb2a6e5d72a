//! Application layer: the order use cases built on the domain ports.
//!
//! `orchestrator::PayOrderOrchestrator` is the entry point. It composes the
//! channel dispatcher, the order state machine, the outcome handler, the
//! merchant notifier and the re-query scheduler, all of which only talk to
//! storage and queues through `domain::ports`.

pub mod dispatcher;
pub mod notify;
pub mod orchestrator;
pub mod outcome;
pub mod requery;
pub mod state_machine;
pub mod url;
