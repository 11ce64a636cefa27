//! ObserverAggregator: per-node fan-in of observation contributions.
//!
//! The aggregator's registries and buffers are actor-owned state, mutated
//! only by messages addressed to this actor. Elements never observe or
//! mutate each other's contributions; arbitrary interleaving of arrivals
//! is tolerated because the merge is commutative and associative and the
//! final fold runs in component order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use acton_reactive::prelude::*;
use tracing::{debug, trace, warn};

use crate::messages::{
    Contribute, ObservationComplete, ObserverStateReport, QueryObserverState, RegisterContributor,
};
use crate::observation::{
    ArrayComponentId, ObservationAggregate, ObservationId, TypeOfObservation,
};
use crate::writer::ObserverWriter;

/// Actor state for the ObserverAggregator.
///
/// Everything starts empty; only registration and contribution messages
/// mutate it.
#[derive(Default, Clone)]
pub struct ObserverAggregatorState {
    /// Total registration events. Monotonic: duplicate registrations are
    /// accepted and counted again, deliberately.
    pub number_of_events: usize,
    /// Components registered for reduction output.
    pub reduction_components: HashSet<ArrayComponentId>,
    /// Components registered for volume output.
    pub volume_components: HashSet<ArrayComponentId>,
    /// Per-observation record of which reduction components contributed.
    reduction_contributed: HashMap<ObservationId, HashSet<ArrayComponentId>>,
    /// Per-observation record of which volume components contributed.
    volume_contributed: HashMap<ObservationId, HashSet<ArrayComponentId>>,
    /// Accumulating reduction aggregates.
    reduction_data: HashMap<ObservationId, ObservationAggregate>,
    /// Accumulating volume aggregates.
    volume_data: HashMap<ObservationId, ObservationAggregate>,
    /// The global writer flushed-to when a class completes an observation.
    writer: Option<Arc<ObserverWriter>>,
}

impl std::fmt::Debug for ObserverAggregatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverAggregatorState")
            .field("number_of_events", &self.number_of_events)
            .field("reduction_components", &self.reduction_components.len())
            .field("volume_components", &self.volume_components.len())
            .field("pending_reductions", &self.reduction_data.len())
            .field("pending_volumes", &self.volume_data.len())
            .finish()
    }
}

/// Per-node observer aggregator.
///
/// Spawning the actor is `initialize()`: counter zero, registries and
/// buffers empty. Handles:
/// - `RegisterContributor` - count the event, record the component
/// - `Contribute` - merge into the running aggregate; flush to the writer
///   once every registered component of the class has contributed
/// - `QueryObserverState` - broadcast a registry snapshot
pub struct ObserverAggregator {
    pub writer: Arc<ObserverWriter>,
}

impl ObserverAggregator {
    pub fn new(writer: Arc<ObserverWriter>) -> Self {
        Self { writer }
    }

    /// Spawn the aggregator in the given runtime.
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> ActorHandle {
        let mut actor = runtime
            .new_actor_with_name::<ObserverAggregatorState>("ObserverAggregator".to_string());

        actor.model.writer = Some(self.writer);

        configure_aggregator(&mut actor);

        actor.start().await
    }
}

/// Configure message handlers for the ObserverAggregator.
fn configure_aggregator(actor: &mut ManagedActor<Idle, ObserverAggregatorState>) {
    // Handle RegisterContributor - monotonic counter, class registries
    actor.mutate_on::<RegisterContributor>(|actor, context| {
        let msg = context.message().clone();

        actor.model.number_of_events += 1;
        if msg.type_of_observation.registers_reduction() {
            actor.model.reduction_components.insert(msg.component.clone());
        }
        if msg.type_of_observation.registers_volume() {
            actor.model.volume_components.insert(msg.component.clone());
        }

        debug!(
            component = %msg.component,
            observation_key = msg.observation_key,
            events = actor.model.number_of_events,
            "Contributor registered"
        );
        Reply::ready()
    });

    // Handle Contribute - merge, record, flush on class completion
    actor.mutate_on::<Contribute>(|actor, context| {
        let msg = context.message().clone();

        match msg.class {
            TypeOfObservation::Reduction => {
                actor
                    .model
                    .reduction_data
                    .entry(msg.observation)
                    .or_default()
                    .contribute(msg.component.clone(), &msg.data);
                let contributed = actor
                    .model
                    .reduction_contributed
                    .entry(msg.observation)
                    .or_default();
                contributed.insert(msg.component.clone());
                trace!(
                    observation = %msg.observation,
                    component = %msg.component,
                    contributed = contributed.len(),
                    registered = actor.model.reduction_components.len(),
                    "Reduction contribution merged"
                );

                let registered = &actor.model.reduction_components;
                if registered.is_empty() || !registered.is_subset(contributed) {
                    return Reply::ready();
                }

                let folded = actor
                    .model
                    .reduction_data
                    .remove(&msg.observation)
                    .map(|aggregate| aggregate.fold())
                    .unwrap_or_default();
                actor.model.reduction_contributed.remove(&msg.observation);

                let writer = actor.model.writer.clone();
                let broker = actor.broker().clone();
                let observation = msg.observation;
                Reply::pending(async move {
                    let Some(writer) = writer else {
                        warn!("ObserverAggregator has no writer");
                        return;
                    };
                    if let Err(error) = writer.commit_reduction(observation, folded).await {
                        warn!(observation = %observation, error = %error, "Reduction commit failed");
                        return;
                    }
                    broker
                        .broadcast(ObservationComplete {
                            observation,
                            class: TypeOfObservation::Reduction,
                        })
                        .await;
                })
            }
            TypeOfObservation::Volume => {
                actor
                    .model
                    .volume_data
                    .entry(msg.observation)
                    .or_default()
                    .contribute(msg.component.clone(), &msg.data);
                let contributed = actor
                    .model
                    .volume_contributed
                    .entry(msg.observation)
                    .or_default();
                contributed.insert(msg.component.clone());
                trace!(
                    observation = %msg.observation,
                    component = %msg.component,
                    contributed = contributed.len(),
                    registered = actor.model.volume_components.len(),
                    "Volume contribution merged"
                );

                let registered = &actor.model.volume_components;
                if registered.is_empty() || !registered.is_subset(contributed) {
                    return Reply::ready();
                }

                let folded = actor
                    .model
                    .volume_data
                    .remove(&msg.observation)
                    .map(|aggregate| aggregate.fold())
                    .unwrap_or_default();
                let mut contributors: Vec<ArrayComponentId> = actor
                    .model
                    .volume_contributed
                    .remove(&msg.observation)
                    .map(|set| set.into_iter().collect())
                    .unwrap_or_default();
                contributors.sort();

                let writer = actor.model.writer.clone();
                let broker = actor.broker().clone();
                let observation = msg.observation;
                Reply::pending(async move {
                    let Some(writer) = writer else {
                        warn!("ObserverAggregator has no writer");
                        return;
                    };
                    if let Err(error) =
                        writer.commit_volume(observation, contributors, folded).await
                    {
                        warn!(observation = %observation, error = %error, "Volume commit failed");
                        return;
                    }
                    broker
                        .broadcast(ObservationComplete {
                            observation,
                            class: TypeOfObservation::Volume,
                        })
                        .await;
                })
            }
            TypeOfObservation::ReductionAndVolume => {
                warn!(
                    observation = %msg.observation,
                    component = %msg.component,
                    "Contribution must name a single output class"
                );
                Reply::ready()
            }
        }
    });

    // Handle QueryObserverState - broadcast a registry snapshot
    actor.act_on::<QueryObserverState>(|actor, context| {
        let correlation_id = context.message().correlation_id.clone();
        let report = ObserverStateReport {
            correlation_id,
            number_of_events: actor.model.number_of_events,
            reduction_components: actor.model.reduction_components.clone(),
            volume_components: actor.model.volume_components.clone(),
        };
        let broker = actor.broker().clone();
        Reply::pending(async move {
            broker.broadcast(report).await;
        })
    });
}
