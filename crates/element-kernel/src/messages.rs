//! Message types for acton-reactive actor communication.
//!
//! Messages use correlation IDs (via the mti crate) where a dispatch fans
//! out across many concurrent actors and responses must be matched back.

use std::collections::HashSet;

use crate::domain::Block;
use crate::observation::{ArrayComponentId, ObservationId, TensorData, TypeOfObservation};
use crate::time::TimeInfo;

/// One-time local initialization of an element.
///
/// Sent exactly once per element, after the array has been sealed. Carries
/// the element's block (with adjacency), its grid extents, and the
/// resolved initial time/step/slab-size.
#[derive(Debug, Clone)]
pub struct InitializeElement {
    pub block: Block,
    pub extents: Vec<usize>,
    pub time: TimeInfo,
}

/// Run the element's action list once, strictly in declared order.
///
/// Broadcast to every element on an `Evolve` transition; fire-and-forget.
/// No ordering is guaranteed or assumed between different elements.
#[derive(Debug, Clone)]
pub struct RunActions {
    /// Correlation ID for this dispatch (logging only).
    pub correlation_id: String,
}

/// Instruct an element to register itself with the observer.
///
/// Sent to every element on a `RegisterWithObserver` transition when the
/// pipeline declared the registration capability at assembly.
#[derive(Debug, Clone)]
pub struct RegisterWithObserver {
    /// Temporal identity to register under. Currently always the fixed
    /// placeholder `0`; elements do not yet migrate, so no per-phase
    /// identity is needed.
    pub observation_key: u64,
}

// ============================================================================
// Observer Aggregator Messages
// ============================================================================

/// Register one array component as a contributor.
///
/// Each registration increments the aggregator's event counter by one.
/// Registration is deliberately not idempotent: registering the same
/// component twice counts twice. Duplicates are accepted, never rejected.
#[derive(Debug, Clone)]
pub struct RegisterContributor {
    /// Temporal identity (the fixed placeholder `0` for now).
    pub observation_key: u64,
    /// Who is registering.
    pub component: ArrayComponentId,
    /// Which output class(es) the component will contribute to.
    pub type_of_observation: TypeOfObservation,
}

/// One element's contribution to an observation event.
///
/// Contributions for the same observation may arrive in any order; the
/// aggregator's merge is commutative and associative.
#[derive(Debug, Clone)]
pub struct Contribute {
    pub observation: ObservationId,
    pub component: ArrayComponentId,
    /// `Reduction` or `Volume`; a single contribution never spans both.
    pub class: TypeOfObservation,
    pub data: TensorData,
}

/// Broadcast when every registered contributor of a class has contributed
/// to an observation and the folded aggregate has been handed to the
/// writer.
#[derive(Debug, Clone)]
pub struct ObservationComplete {
    pub observation: ObservationId,
    pub class: TypeOfObservation,
}

/// Ask the aggregator for a snapshot of its registries.
#[derive(Debug, Clone)]
pub struct QueryObserverState {
    /// Correlation ID for this query.
    pub correlation_id: String,
}

/// Snapshot of the aggregator's registries, broadcast in response to
/// [`QueryObserverState`].
#[derive(Debug, Clone)]
pub struct ObserverStateReport {
    /// Correlation ID matching the original query.
    pub correlation_id: String,
    /// Total registration events observed (monotonic, duplicates counted).
    pub number_of_events: usize,
    /// Components registered for reduction output.
    pub reduction_components: HashSet<ArrayComponentId>,
    /// Components registered for volume output.
    pub volume_components: HashSet<ArrayComponentId>,
}
