//! Element kernel: deterministic domain decomposition, phase-driven
//! distributed execution, and a two-tier observation protocol.
//!
//! A domain is decomposed into uniquely identified elements, each owned by
//! its own actor and placed on a worker by a pure function of the domain,
//! the refinement spec, and the worker count. A phase controller advances
//! the whole array in lock-step between globally synchronized phases while
//! execution within a phase is unordered and independent. Output flows
//! through a per-node aggregator into a globally locked writer, with
//! reduction and volume data serialized independently.

pub mod action;
pub mod actors;
pub mod config;
pub mod domain;
pub mod element_id;
pub mod error;
pub mod messages;
pub mod observation;
pub mod phase;
pub mod state;
pub mod time;
pub mod writer;

pub use action::{Action, ActionContext, ActionList};
pub use actors::{ElementArray, ObserverAggregator, WorkerPool};
pub use config::ArrayConfig;
pub use domain::{Block, BlockId, BlockNeighbor, Domain, DomainSource, Side};
pub use element_id::{element_count, initial_element_ids, ElementId, SegmentId};
pub use error::KernelError;
pub use observation::{ArrayComponentId, ObservationId, TensorData, TypeOfObservation};
pub use phase::Phase;
pub use state::ElementFields;
pub use time::{TimeInfo, TimeStepper};
pub use writer::ObserverWriter;
