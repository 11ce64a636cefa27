//! Globally synchronized execution phases.

use serde::{Deserialize, Serialize};

/// One stage of the overall computation.
///
/// The active phase is process-global, single-valued state: it advances
/// only through
/// [`execute_next_phase`](crate::actors::ElementArray::execute_next_phase),
/// driven in sequence by an external top-level loop. Dispatch
/// special-cases `Evolve` and
/// `RegisterWithObserver`; every other phase is a no-op at this layer,
/// reserved for actions and collaborators to react to independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Initialize,
    RegisterWithObserver,
    Evolve,
    Exit,
}
