//! Client prediction and server reconciliation of hits.
//!
//! The firing client simulates its shot locally, shows predicted markers
//! and submits the hits; the authority validates them and replies with a
//! confirm/deny that the client reconciles exactly once per batch.

pub mod messages;
pub mod ledger;
pub mod reconcile;
pub mod client;
pub mod authority;
pub mod link;

pub use messages::{ConfirmTargetData, SubmitTargetData};
pub use ledger::{ConfirmedHitLedger, HitMarkerLedger, LedgerConfig, PredictedMarker, ScreenHitEntry};
pub use reconcile::{ReconcileOutcome, ReconciliationProtocol, UnconfirmedBatch};
pub use client::{AbilityGate, FireError, FireOutcome, FiringController, HitSuccessPolicy, ScreenProjector};
pub use authority::{AuthorityConfig, ControllerAuthority, DamageEvent, SubmissionResult};
pub use link::{LinkConfig, LossyLink};
