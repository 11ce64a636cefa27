//! Integration tests for the observer registration/aggregation protocol.
//!
//! Covers:
//! - registration is deliberately not idempotent (counter 1, then 2)
//! - an observation flushes only once every registered contributor of the
//!   class has contributed
//! - the final aggregate is bit-identical for any arrival order

use std::path::PathBuf;
use std::sync::Arc;

use acton_reactive::prelude::*;
use tokio::sync::RwLock;
use tokio::time::Duration;

use element_kernel::messages::{
    Contribute, ObservationComplete, ObserverStateReport, QueryObserverState, RegisterContributor,
};
use element_kernel::{
    initial_element_ids, ArrayComponentId, ObservationId, ObserverAggregator, ObserverWriter,
    TensorData, TypeOfObservation,
};

fn temp_output_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("observer-test-{}-{}", tag, std::process::id()))
}

fn component(block: u32) -> ArrayComponentId {
    let id = initial_element_ids(block, &[0])
        .into_iter()
        .next()
        .unwrap();
    ArrayComponentId::new("element_array", id)
}

fn tensor(name: &str, values: Vec<f64>) -> TensorData {
    let mut data = TensorData::new();
    data.insert(name, values);
    data
}

/// Records broadcast reports and completions for assertions.
#[derive(Default, Clone)]
struct RecorderState {
    reports: Arc<RwLock<Vec<ObserverStateReport>>>,
    completions: Arc<RwLock<Vec<ObservationComplete>>>,
}

impl std::fmt::Debug for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderState").finish()
    }
}

async fn spawn_recorder(
    runtime: &mut ActorRuntime,
    reports: Arc<RwLock<Vec<ObserverStateReport>>>,
    completions: Arc<RwLock<Vec<ObservationComplete>>>,
) -> ActorHandle {
    let mut actor = runtime.new_actor_with_name::<RecorderState>("Recorder".to_string());
    actor.model.reports = reports;
    actor.model.completions = completions;

    // Subscribe to broadcasts BEFORE starting
    actor.handle().subscribe::<ObserverStateReport>().await;
    actor.handle().subscribe::<ObservationComplete>().await;

    actor.act_on::<ObserverStateReport>(|actor, context| {
        let msg = context.message().clone();
        let store = actor.model.reports.clone();
        Reply::pending(async move {
            store.write().await.push(msg);
        })
    });

    actor.act_on::<ObservationComplete>(|actor, context| {
        let msg = context.message().clone();
        let store = actor.model.completions.clone();
        Reply::pending(async move {
            store.write().await.push(msg);
        })
    });

    actor.start().await
}

#[tokio::test]
async fn test_duplicate_registration_counts_twice() {
    let dir = temp_output_dir("duplicate-registration");
    let _ = std::fs::remove_dir_all(&dir);
    let mut runtime = ActonApp::launch_async().await;

    let writer = ObserverWriter::initialize(&dir).unwrap();
    let aggregator = ObserverAggregator::new(writer).spawn(&mut runtime).await;

    let reports = Arc::new(RwLock::new(Vec::new()));
    let completions = Arc::new(RwLock::new(Vec::new()));
    spawn_recorder(&mut runtime, reports.clone(), completions).await;

    let registering = component(0);

    aggregator
        .send(RegisterContributor {
            observation_key: 0,
            component: registering.clone(),
            type_of_observation: TypeOfObservation::Reduction,
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    aggregator
        .send(QueryObserverState {
            correlation_id: "after-first".to_string(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Registering the same component again is accepted, not rejected,
    // and increments the counter a second time.
    aggregator
        .send(RegisterContributor {
            observation_key: 0,
            component: registering,
            type_of_observation: TypeOfObservation::Reduction,
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    aggregator
        .send(QueryObserverState {
            correlation_id: "after-second".to_string(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let reports = reports.read().await;
    let first = reports
        .iter()
        .find(|r| r.correlation_id == "after-first")
        .expect("first report");
    let second = reports
        .iter()
        .find(|r| r.correlation_id == "after-second")
        .expect("second report");

    assert_eq!(first.number_of_events, 1);
    assert_eq!(second.number_of_events, 2);
    // The registry itself stays a set; only the counter is monotonic.
    assert_eq!(second.reduction_components.len(), 1);

    runtime.shutdown_all().await.unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_observation_flushes_only_when_all_contributed() {
    let dir = temp_output_dir("flush-completeness");
    let _ = std::fs::remove_dir_all(&dir);
    let mut runtime = ActonApp::launch_async().await;

    let writer = ObserverWriter::initialize(&dir).unwrap();
    let aggregator = ObserverAggregator::new(writer).spawn(&mut runtime).await;

    let reports = Arc::new(RwLock::new(Vec::new()));
    let completions = Arc::new(RwLock::new(Vec::new()));
    spawn_recorder(&mut runtime, reports, completions.clone()).await;

    let first = component(0);
    let second = component(1);
    for contributor in [&first, &second] {
        aggregator
            .send(RegisterContributor {
                observation_key: 0,
                component: contributor.clone(),
                type_of_observation: TypeOfObservation::Reduction,
            })
            .await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let observation = ObservationId::new(&1_u64, 0.1);
    aggregator
        .send(Contribute {
            observation,
            component: first,
            class: TypeOfObservation::Reduction,
            data: tensor("norm", vec![1.0]),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        completions.read().await.is_empty(),
        "must not flush before every registered contributor has contributed"
    );

    aggregator
        .send(Contribute {
            observation,
            component: second,
            class: TypeOfObservation::Reduction,
            data: tensor("norm", vec![2.0]),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    let completions = completions.read().await;
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].observation, observation);
    assert_eq!(completions[0].class, TypeOfObservation::Reduction);

    runtime.shutdown_all().await.unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}

/// Run one aggregation of three contributions in the given arrival order
/// and return the raw persisted bytes.
async fn aggregate_in_order(tag: &str, order: [usize; 3]) -> Vec<u8> {
    let dir = temp_output_dir(tag);
    let _ = std::fs::remove_dir_all(&dir);
    let mut runtime = ActonApp::launch_async().await;

    let writer = ObserverWriter::initialize(&dir).unwrap();
    let aggregator = ObserverAggregator::new(writer.clone())
        .spawn(&mut runtime)
        .await;

    let reports = Arc::new(RwLock::new(Vec::new()));
    let completions = Arc::new(RwLock::new(Vec::new()));
    spawn_recorder(&mut runtime, reports, completions.clone()).await;

    // Values chosen so a naive arrival-order sum differs in the last bit.
    let contributions = [
        (component(0), tensor("u", vec![0.1, 1.0 / 3.0])),
        (component(1), tensor("u", vec![0.2, 1.0 / 7.0])),
        (component(2), tensor("u", vec![0.3, 1.0 / 11.0])),
    ];

    for (contributor, _) in &contributions {
        aggregator
            .send(RegisterContributor {
                observation_key: 0,
                component: contributor.clone(),
                type_of_observation: TypeOfObservation::Reduction,
            })
            .await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let observation = ObservationId::new(&7_u64, 0.7);
    for index in order {
        let (contributor, data) = &contributions[index];
        aggregator
            .send(Contribute {
                observation,
                component: contributor.clone(),
                class: TypeOfObservation::Reduction,
                data: data.clone(),
            })
            .await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(completions.read().await.len(), 1);

    let bytes = std::fs::read(writer.reduction_path()).unwrap();
    runtime.shutdown_all().await.unwrap();
    let _ = std::fs::remove_dir_all(&dir);
    bytes
}

#[tokio::test]
async fn test_aggregate_is_bit_identical_across_arrival_orders() {
    let forward = aggregate_in_order("order-forward", [0, 1, 2]).await;
    let reversed = aggregate_in_order("order-reversed", [2, 1, 0]).await;
    let rotated = aggregate_in_order("order-rotated", [1, 2, 0]).await;

    assert_eq!(forward, reversed);
    assert_eq!(forward, rotated);
}
