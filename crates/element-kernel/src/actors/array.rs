//! Element distribution and phase dispatch.
//!
//! Construction is two-phase: an [`ElementArrayBuilder`] accepts inserts
//! while open and is consumed into the immutable, dispatch-ready
//! [`ElementArray`] when sealed. Insertion after sealing is not
//! representable. Phase dispatch is a broadcast, not a rendezvous: the
//! controller returns once every targeted element has been sent its
//! instruction and never waits for elements to finish.

use acton_reactive::prelude::*;
use mti::prelude::*;
use tracing::{debug, info, trace};

use crate::action::ActionList;
use crate::actors::ElementActor;
use crate::config::ArrayConfig;
use crate::domain::DomainSource;
use crate::element_id::{initial_element_ids, ElementId};
use crate::error::KernelError;
use crate::messages::{InitializeElement, RegisterWithObserver, RunActions};
use crate::observation::TypeOfObservation;
use crate::phase::Phase;
use crate::time::{TimeInfo, TimeStepper};

/// The fixed pool of worker processes elements are placed on.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    count: usize,
}

impl WorkerPool {
    /// Query the runtime for the available worker count.
    pub fn detect() -> Self {
        Self {
            count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn with_count(count: usize) -> Self {
        Self {
            count: count.max(1),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// One element, its worker assignment, and its live actor handle.
#[derive(Debug, Clone)]
struct PlacedElement {
    id: ElementId,
    worker: usize,
    handle: ActorHandle,
}

/// Open-insertion accumulator for the element set.
///
/// Consumed by [`ElementArrayBuilder::done_inserting`]; afterwards no
/// insert exists to call.
pub struct ElementArrayBuilder {
    component_name: String,
    pipeline: ActionList,
    observer: ActorHandle,
    workers: usize,
    elements: Vec<PlacedElement>,
}

impl ElementArrayBuilder {
    pub fn new(
        component_name: String,
        pipeline: ActionList,
        observer: ActorHandle,
        workers: usize,
    ) -> Self {
        Self {
            component_name,
            pipeline,
            observer,
            workers,
            elements: Vec::new(),
        }
    }

    /// Place one element on a worker and spawn its actor.
    pub async fn insert(&mut self, runtime: &mut ActorRuntime, id: ElementId, worker: usize) {
        trace!(element = %id, worker, "Placing element");
        let handle = ElementActor::new(
            id.clone(),
            worker,
            self.pipeline.clone(),
            self.observer.clone(),
            self.component_name.clone(),
        )
        .spawn(runtime)
        .await;
        self.elements.push(PlacedElement { id, worker, handle });
    }

    /// Seal the array. This is the creation barrier: the builder is
    /// consumed, so no element can be added for this distribution run.
    pub fn done_inserting(self) -> ElementArray {
        info!(
            elements = self.elements.len(),
            workers = self.workers,
            "Element array sealed"
        );
        ElementArray {
            registration: self.pipeline.registration(),
            workers: self.workers,
            elements: self.elements,
        }
    }
}

/// The sealed, dispatch-ready distributed element array.
pub struct ElementArray {
    registration: Option<TypeOfObservation>,
    workers: usize,
    elements: Vec<PlacedElement>,
}

impl ElementArray {
    /// Build and place the whole element array.
    ///
    /// Validates the configuration before creating anything, decomposes
    /// the domain into elements, assigns them round-robin over the worker
    /// pool with one running counter across all blocks (the i-th element
    /// created goes to worker `i mod P`), seals the array, and then sends
    /// exactly one local-initialization message to every element.
    ///
    /// Re-running with an identical domain, refinement, and pool yields an
    /// identical placement.
    #[allow(clippy::too_many_arguments)]
    pub async fn initialize(
        runtime: &mut ActorRuntime,
        source: &dyn DomainSource,
        pipeline: ActionList,
        stepper: &dyn TimeStepper,
        config: &ArrayConfig,
        observer: ActorHandle,
        pool: WorkerPool,
        initial_time: f64,
        initial_dt: f64,
        initial_slab_size: Option<f64>,
    ) -> Result<Self, KernelError> {
        let slab_size = initial_slab_size.unwrap_or_else(|| initial_dt.abs());

        if !config.local_time_stepping && initial_dt.abs() != slab_size {
            return Err(KernelError::Configuration(
                "step and slab size must agree for global time-stepping".to_string(),
            ));
        }
        if config.local_time_stepping && !stepper.is_self_starting() {
            return Err(KernelError::Configuration(format!(
                "local time stepping requires a self-starting integrator, got {}",
                stepper.name()
            )));
        }

        let domain = source.create_domain();
        let refinement = source.initial_refinement();
        let extents = source.initial_extents();

        // Validate per-block specs up front so a failure creates nothing.
        for block in domain.blocks() {
            if refinement.get(block.id as usize).is_none() {
                return Err(KernelError::MissingRefinement(block.id));
            }
            if extents.get(block.id as usize).is_none() {
                return Err(KernelError::MissingExtents(block.id));
            }
        }

        let mut builder = ElementArrayBuilder::new(
            config.component_name.clone(),
            pipeline,
            observer,
            pool.count(),
        );

        // One running counter across all blocks, never reset per block.
        let mut created: usize = 0;
        for block in domain.blocks() {
            let levels = &refinement[block.id as usize];
            for id in initial_element_ids(block.id, levels) {
                builder
                    .insert(runtime, id, created % pool.count())
                    .await;
                created += 1;
            }
        }

        let array = builder.done_inserting();

        // After sealing: exactly one local-initialization call per element.
        let time = TimeInfo {
            initial_time,
            initial_dt,
            slab_size,
        };
        for placed in &array.elements {
            let Some(block) = domain.block(placed.id.block) else {
                continue;
            };
            placed
                .handle
                .send(InitializeElement {
                    block: block.clone(),
                    extents: extents[placed.id.block as usize].clone(),
                    time,
                })
                .await;
        }

        Ok(array)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// The element-to-worker mapping, in creation order.
    pub fn assignments(&self) -> impl Iterator<Item = (&ElementId, usize)> {
        self.elements.iter().map(|placed| (&placed.id, placed.worker))
    }

    /// Dispatch one global phase transition.
    ///
    /// - `Evolve`: every element is told to run its action list; elements
    ///   complete at their own pace and in no particular mutual order.
    /// - `RegisterWithObserver`: only if the pipeline declared the
    ///   registration capability at assembly; otherwise a no-op.
    /// - Anything else: a no-op at this layer.
    ///
    /// Per-element action failures are not intercepted here; they surface
    /// through the acting element's own execution path.
    pub async fn execute_next_phase(&self, phase: Phase) {
        match phase {
            Phase::Evolve => {
                let correlation_id = "evolve".create_type_id::<V7>().to_string();
                debug!(
                    correlation_id = %correlation_id,
                    elements = self.elements.len(),
                    "Dispatching Evolve"
                );
                for placed in &self.elements {
                    placed
                        .handle
                        .send(RunActions {
                            correlation_id: correlation_id.clone(),
                        })
                        .await;
                }
            }
            Phase::RegisterWithObserver => {
                if self.registration.is_none() {
                    trace!("Pipeline has no registration capability; skipping");
                    return;
                }
                // Fixed placeholder temporal identity. Elements do not yet
                // migrate, so no per-phase identity exists to register under.
                const PLACEHOLDER_OBSERVATION_KEY: u64 = 0;
                debug!(elements = self.elements.len(), "Dispatching registration");
                for placed in &self.elements {
                    placed
                        .handle
                        .send(RegisterWithObserver {
                            observation_key: PLACEHOLDER_OBSERVATION_KEY,
                        })
                        .await;
                }
            }
            _ => {}
        }
    }
}
