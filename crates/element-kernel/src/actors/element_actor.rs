//! ElementActor: autonomous owner of one element's state and pipeline.
//!
//! Each element is its own actor. Its mailbox serializes everything that
//! touches the element, so the action list executes single-threadedly and
//! strictly in declared order per invocation, while different elements run
//! with no mutual ordering at all.

use std::sync::Arc;

use acton_reactive::prelude::*;
use tracing::{debug, warn};

use crate::action::{ActionContext, ActionList, Emission};
use crate::domain::Block;
use crate::element_id::ElementId;
use crate::messages::{Contribute, InitializeElement, RegisterContributor, RegisterWithObserver, RunActions};
use crate::observation::ArrayComponentId;
use crate::state::ElementFields;
use crate::time::TimeInfo;

/// Actor state for a single element.
#[derive(Default, Clone)]
pub struct ElementActorState {
    /// This element's identity; fixed for its lifetime.
    pub id: ElementId,
    /// Worker this element was placed on at distribution time.
    pub worker: usize,
    /// Identity used when registering and contributing to the observer.
    pub component: Option<ArrayComponentId>,
    /// Private typed field store; no other element ever touches it.
    pub fields: Arc<std::sync::Mutex<ElementFields>>,
    /// The ordered action pipeline bound at construction.
    pub actions: Option<ActionList>,
    /// Handle to the node's observer aggregator.
    pub observer: Option<ActorHandle>,
    /// This element's block, delivered at local initialization.
    pub block: Option<Block>,
    /// Grid extents, delivered at local initialization.
    pub extents: Vec<usize>,
    /// Resolved time state, delivered at local initialization.
    pub time: Option<TimeInfo>,
    /// Completed `RunActions` invocations.
    pub step: u64,
    /// Whether local initialization has run.
    pub initialized: bool,
}

impl std::fmt::Debug for ElementActorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementActorState")
            .field("id", &self.id)
            .field("worker", &self.worker)
            .field("initialized", &self.initialized)
            .field("step", &self.step)
            .finish()
    }
}

/// Actor representing one element of the distributed array.
///
/// Handles:
/// - `InitializeElement` - one-time local initialization (append-only
///   field creation via the pipeline's initialize pass)
/// - `RunActions` - execute the action list strictly in order
/// - `RegisterWithObserver` - register this element's component identity
pub struct ElementActor {
    pub id: ElementId,
    pub worker: usize,
    pub actions: ActionList,
    pub observer: ActorHandle,
    pub component_name: String,
}

impl ElementActor {
    pub fn new(
        id: ElementId,
        worker: usize,
        actions: ActionList,
        observer: ActorHandle,
        component_name: String,
    ) -> Self {
        Self {
            id,
            worker,
            actions,
            observer,
            component_name,
        }
    }

    /// Spawn this element actor in the given runtime.
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> ActorHandle {
        let mut actor = runtime
            .new_actor_with_name::<ElementActorState>(format!("Element:{}", self.id));

        actor.model.component = Some(ArrayComponentId::new(
            self.component_name.clone(),
            self.id.clone(),
        ));
        actor.model.id = self.id;
        actor.model.worker = self.worker;
        actor.model.actions = Some(self.actions);
        actor.model.observer = Some(self.observer);

        configure_element_actor(&mut actor);

        actor.start().await
    }
}

/// Configure message handlers for the ElementActor.
fn configure_element_actor(actor: &mut ManagedActor<Idle, ElementActorState>) {
    // Handle InitializeElement - exactly-once local initialization
    actor.mutate_on::<InitializeElement>(|actor, context| {
        if actor.model.initialized {
            warn!(element = %actor.model.id, "Duplicate InitializeElement ignored");
            return Reply::ready();
        }
        let msg = context.message().clone();
        actor.model.block = Some(msg.block);
        actor.model.extents = msg.extents;
        actor.model.time = Some(msg.time);
        actor.model.initialized = true;

        let Some(actions) = actor.model.actions.clone() else {
            warn!(element = %actor.model.id, "ElementActor has no pipeline");
            return Reply::ready();
        };
        let id = actor.model.id.clone();
        let extents = actor.model.extents.clone();
        let time = msg.time;
        let fields = actor.model.fields.clone();

        let emissions = {
            let Ok(mut fields) = fields.lock() else {
                warn!(element = %id, "Field store poisoned");
                return Reply::ready();
            };
            let mut ctx = ActionContext::new(&id, &extents, time, 0, &mut fields);
            for action in actions.actions() {
                if let Err(error) = action.initialize(&mut ctx) {
                    warn!(
                        element = %id,
                        action = action.name(),
                        error = %error,
                        "Action initialization failed"
                    );
                    break;
                }
            }
            ctx.into_emissions()
        };

        debug!(element = %id, fields = fields.lock().map(|f| f.len()).unwrap_or(0), "Element initialized");
        forward_emissions(
            actor.model.observer.clone(),
            actor.model.component.clone(),
            &id,
            emissions,
        )
    });

    // Handle RunActions - run the pipeline once, strictly in order.
    // Failures are this element's own affair: logged here, never
    // intercepted or translated by the phase controller.
    actor.mutate_on::<RunActions>(|actor, _context| {
        if !actor.model.initialized {
            warn!(element = %actor.model.id, "RunActions before initialization");
            return Reply::ready();
        }
        let Some(actions) = actor.model.actions.clone() else {
            return Reply::ready();
        };
        let Some(time) = actor.model.time else {
            return Reply::ready();
        };
        let id = actor.model.id.clone();
        let extents = actor.model.extents.clone();
        let step = actor.model.step;
        actor.model.step += 1;
        let fields = actor.model.fields.clone();

        let emissions = {
            let Ok(mut fields) = fields.lock() else {
                warn!(element = %id, "Field store poisoned");
                return Reply::ready();
            };
            let mut ctx = ActionContext::new(&id, &extents, time, step, &mut fields);
            for action in actions.actions() {
                if let Err(error) = action.invoke(&mut ctx) {
                    warn!(
                        element = %id,
                        action = action.name(),
                        error = %error,
                        "Action failed; remaining actions skipped for this invocation"
                    );
                    break;
                }
            }
            ctx.into_emissions()
        };

        forward_emissions(
            actor.model.observer.clone(),
            actor.model.component.clone(),
            &id,
            emissions,
        )
    });

    // Handle RegisterWithObserver - register own component identity
    actor.act_on::<RegisterWithObserver>(|actor, context| {
        let observation_key = context.message().observation_key;
        let Some(actions) = actor.model.actions.as_ref() else {
            return Reply::ready();
        };
        let Some(class) = actions.registration() else {
            return Reply::ready();
        };
        let Some(component) = actor.model.component.clone() else {
            return Reply::ready();
        };
        let Some(observer) = actor.model.observer.clone() else {
            warn!(element = %actor.model.id, "RegisterWithObserver: observer not set");
            return Reply::ready();
        };

        debug!(component = %component, observation_key, "Registering with observer");
        Reply::pending(async move {
            observer
                .send(RegisterContributor {
                    observation_key,
                    component,
                    type_of_observation: class,
                })
                .await;
        })
    });
}

/// Forward queued observation contributions to the aggregator, tagged with
/// this element's component identity.
fn forward_emissions(
    observer: Option<ActorHandle>,
    component: Option<ArrayComponentId>,
    id: &ElementId,
    emissions: Vec<Emission>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + Sync + 'static>> {
    if emissions.is_empty() {
        return Reply::ready();
    }
    let Some(observer) = observer else {
        warn!(element = %id, "No observer to forward contributions to");
        return Reply::ready();
    };
    let Some(component) = component else {
        return Reply::ready();
    };

    Reply::pending(async move {
        for emission in emissions {
            observer
                .send(Contribute {
                    observation: emission.observation,
                    component: component.clone(),
                    class: emission.class,
                    data: emission.data,
                })
                .await;
        }
    })
}
