//! Acton-reactive actors for the element kernel.
//!
//! ```text
//! initialize(source, pipeline, ...)
//!   ├─ validate config (eager; nothing created on failure)
//!   ├─ decompose domain → ElementIds, worker = i mod P (one running counter)
//!   ├─ ElementArrayBuilder.insert → spawn ElementActor (one per element)
//!   ├─ done_inserting (creation barrier: builder consumed)
//!   └─ InitializeElement → every element (exactly once)
//!
//! execute_next_phase(phase)
//!   ├─ Evolve: RunActions → every element (fire-and-forget)
//!   │    └─ element runs its action list in order
//!   │         └─ Contribute → ObserverAggregator (fan-in per node)
//!   │              └─ on class completion: fold → ObserverWriter (locked)
//!   │                   └─ ObservationComplete (broadcast)
//!   └─ RegisterWithObserver: RegisterWithObserver → every element
//!        └─ RegisterContributor → ObserverAggregator (counter += 1)
//! ```
//!
//! ElementActors own their fields; the aggregator owns its registries.
//! Mailbox serialization is the only synchronization inside a phase.

mod aggregator;
mod array;
mod element_actor;

pub use aggregator::{ObserverAggregator, ObserverAggregatorState};
pub use array::{ElementArray, ElementArrayBuilder, WorkerPool};
pub use element_actor::{ElementActor, ElementActorState};
