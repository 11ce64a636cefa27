//! Element action pipelines.
//!
//! An [`ActionList`] is the ordered sequence of local computation steps an
//! element runs per `Evolve` dispatch. Actions are synchronous local
//! computations over the element's own fields; anything an action wants to
//! publish it emits through the context, and the owning actor forwards the
//! emissions. Whether a pipeline registers with the observer is recorded
//! once, when the pipeline is assembled; phase dispatch never inspects
//! action types at runtime.

use std::sync::Arc;

use crate::element_id::ElementId;
use crate::observation::{ObservationId, TensorData, TypeOfObservation};
use crate::state::ElementFields;
use crate::time::TimeInfo;

/// One observation contribution emitted by an action.
#[derive(Debug, Clone)]
pub struct Emission {
    pub observation: ObservationId,
    pub class: TypeOfObservation,
    pub data: TensorData,
}

/// Everything an action may see and touch during one invocation.
pub struct ActionContext<'a> {
    element: &'a ElementId,
    extents: &'a [usize],
    time: TimeInfo,
    step: u64,
    fields: &'a mut ElementFields,
    emissions: Vec<Emission>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        element: &'a ElementId,
        extents: &'a [usize],
        time: TimeInfo,
        step: u64,
        fields: &'a mut ElementFields,
    ) -> Self {
        Self {
            element,
            extents,
            time,
            step,
            fields,
            emissions: Vec::new(),
        }
    }

    pub fn element(&self) -> &ElementId {
        self.element
    }

    pub fn extents(&self) -> &[usize] {
        self.extents
    }

    pub fn time(&self) -> TimeInfo {
        self.time
    }

    /// How many `Evolve` invocations have completed before this one.
    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn fields(&mut self) -> &mut ElementFields {
        self.fields
    }

    /// Queue an observation contribution. The owning actor tags it with
    /// this element's array-component identity and forwards it.
    pub fn emit(&mut self, observation: ObservationId, class: TypeOfObservation, data: TensorData) {
        self.emissions.push(Emission {
            observation,
            class,
            data,
        });
    }

    pub fn into_emissions(self) -> Vec<Emission> {
        self.emissions
    }
}

/// One local computation step in an element's pipeline.
pub trait Action: Send + Sync {
    /// Unique name, used in logs when an invocation fails.
    fn name(&self) -> &str;

    /// Populate initial fields. Runs exactly once per element, during
    /// local initialization, in pipeline order. Field creation is
    /// append-only; mutation belongs in [`Action::invoke`].
    fn initialize(&self, _ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run one step of this action. Invocations of a pipeline execute its
    /// actions strictly in declared order.
    fn invoke(&self, ctx: &mut ActionContext<'_>) -> anyhow::Result<()>;
}

/// Ordered action pipeline, bound to every element of an array at
/// construction.
#[derive(Clone)]
pub struct ActionList {
    actions: Vec<Arc<dyn Action>>,
    registration: Option<TypeOfObservation>,
}

impl ActionList {
    pub fn builder() -> ActionListBuilder {
        ActionListBuilder {
            actions: Vec::new(),
            registration: None,
        }
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// The observer-registration capability recorded at assembly time,
    /// if any.
    pub fn registration(&self) -> Option<TypeOfObservation> {
        self.registration
    }
}

impl std::fmt::Debug for ActionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionList")
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .field("registration", &self.registration)
            .finish()
    }
}

/// Assembles an [`ActionList`].
pub struct ActionListBuilder {
    actions: Vec<Arc<dyn Action>>,
    registration: Option<TypeOfObservation>,
}

impl ActionListBuilder {
    /// Append an action; declared order is execution order.
    pub fn then(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Declare that this pipeline registers with the observer for the
    /// given output class. Checked once here, never per phase transition.
    pub fn register_with_observer(mut self, class: TypeOfObservation) -> Self {
        self.registration = Some(class);
        self
    }

    pub fn build(self) -> ActionList {
        ActionList {
            actions: self.actions,
            registration: self.registration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tag(&'static str);

    impl Action for Tag {
        fn name(&self) -> &str {
            self.0
        }

        fn invoke(&self, ctx: &mut ActionContext<'_>) -> anyhow::Result<()> {
            ctx.fields().get_mut::<Vec<&'static str>>("trace")?.push(self.0);
            Ok(())
        }
    }

    #[test]
    fn actions_run_in_declared_order() {
        let pipeline = ActionList::builder()
            .then(Tag("first"))
            .then(Tag("second"))
            .then(Tag("third"))
            .build();

        let element = ElementId::default();
        let mut fields = ElementFields::new();
        fields.create("trace", Vec::<&'static str>::new()).unwrap();
        let time = TimeInfo {
            initial_time: 0.0,
            initial_dt: 0.1,
            slab_size: 0.1,
        };
        let mut ctx = ActionContext::new(&element, &[4], time, 0, &mut fields);
        for action in pipeline.actions() {
            action.invoke(&mut ctx).unwrap();
        }
        drop(ctx);
        assert_eq!(
            fields.get::<Vec<&'static str>>("trace").unwrap(),
            &vec!["first", "second", "third"]
        );
    }

    #[test]
    fn registration_capability_is_recorded_at_assembly() {
        let without = ActionList::builder().then(Tag("only")).build();
        assert_eq!(without.registration(), None);

        let with = ActionList::builder()
            .then(Tag("only"))
            .register_with_observer(TypeOfObservation::Volume)
            .build();
        assert_eq!(with.registration(), Some(TypeOfObservation::Volume));
    }
}
