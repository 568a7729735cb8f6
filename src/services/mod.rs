/// Cancellable per-phase timers.
pub mod countdown;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Replicated chat and announcement log.
pub mod message_bus;
/// Peers hosted by this process.
pub mod peer_registry;
/// Player roster maintenance.
pub mod roster;
/// Score adjustments.
pub mod score_ledger;
/// Per-peer facade over every player action.
pub mod session_controller;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Round lifecycle driven by timers and roster changes.
pub mod turn_scheduler;
/// Word and option selection.
pub mod word_bank;
