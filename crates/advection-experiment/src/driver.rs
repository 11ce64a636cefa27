//! Experiment harness: wires the kernel to the advection collaborators and
//! drives the global phase sequence.
//!
//! The driver owns the phase loop the kernel leaves to its caller:
//! Initialize, RegisterWithObserver, then Evolve once per step, then Exit.
//! Because phase dispatch is a broadcast and not a barrier, the driver
//! waits on real signals - the aggregator's registry snapshot before
//! evolving, and ObservationComplete broadcasts before exiting - rather
//! than on dispatch returns.

use std::path::{Path, PathBuf};

use acton_reactive::prelude::*;
use anyhow::{anyhow, Result};
use mti::prelude::*;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::{info, warn};
use uuid::Uuid;

use element_kernel::messages::{ObservationComplete, ObserverStateReport, QueryObserverState};
use element_kernel::{
    ActionList, ArrayConfig, ElementArray, ObserverAggregator, ObserverWriter, Phase, TimeStepper,
    TypeOfObservation, WorkerPool,
};

use crate::actions::{AdvectionStep, ObserveField};
use crate::domain_source::LineDomainSource;
use crate::steppers::{AdamsBashforth, RungeKutta4};

/// Which integrator the run hands to the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperChoice {
    RungeKutta4,
    AdamsBashforth2,
}

impl StepperChoice {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RungeKutta4 => "rk4",
            Self::AdamsBashforth2 => "ab2",
        }
    }
}

/// Configuration for one evolution run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub blocks: u32,
    pub refinement: u32,
    pub points: usize,
    pub steps: u64,
    pub observe_every: u64,
    pub velocity: f64,
    pub seed: u64,
    pub initial_time: f64,
    pub initial_dt: f64,
    pub initial_slab_size: Option<f64>,
    pub local_time_stepping: bool,
    pub stepper: StepperChoice,
    pub workers: Option<usize>,
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            blocks: 4,
            refinement: 1,
            points: 8,
            steps: 20,
            observe_every: 5,
            velocity: 0.5,
            seed: 42,
            initial_time: 0.0,
            initial_dt: 0.01,
            initial_slab_size: None,
            local_time_stepping: false,
            stepper: StepperChoice::RungeKutta4,
            workers: None,
            output_dir: PathBuf::from("observations"),
        }
    }
}

/// What a completed run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub elements: usize,
    pub workers: usize,
    pub observations_completed: usize,
    pub output_dir: PathBuf,
}

impl RunSummary {
    /// Write the summary as JSON next to the persisted aggregates.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// State for the completion bridge actor.
#[derive(Default, Clone)]
pub struct CompletionBridgeState {
    completions_tx: Option<mpsc::Sender<ObservationComplete>>,
    reports_tx: Option<mpsc::Sender<ObserverStateReport>>,
}

impl std::fmt::Debug for CompletionBridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionBridgeState")
            .field("has_completions_tx", &self.completions_tx.is_some())
            .field("has_reports_tx", &self.reports_tx.is_some())
            .finish()
    }
}

/// Actor bridging observer broadcasts to the non-actor driver.
///
/// Subscribes to `ObservationComplete` and `ObserverStateReport` and
/// forwards them over mpsc channels the driver can await.
pub struct CompletionBridge {
    completions_tx: mpsc::Sender<ObservationComplete>,
    reports_tx: mpsc::Sender<ObserverStateReport>,
}

impl CompletionBridge {
    pub fn new(
        completions_tx: mpsc::Sender<ObservationComplete>,
        reports_tx: mpsc::Sender<ObserverStateReport>,
    ) -> Self {
        Self {
            completions_tx,
            reports_tx,
        }
    }

    /// Spawn the bridge in the runtime.
    pub async fn spawn(self, runtime: &mut ActorRuntime) -> ActorHandle {
        let mut actor =
            runtime.new_actor_with_name::<CompletionBridgeState>("CompletionBridge".to_string());

        actor.model.completions_tx = Some(self.completions_tx);
        actor.model.reports_tx = Some(self.reports_tx);

        // Subscribe to broadcasts BEFORE starting
        actor.handle().subscribe::<ObservationComplete>().await;
        actor.handle().subscribe::<ObserverStateReport>().await;

        actor.act_on::<ObservationComplete>(|actor, context| {
            let msg = context.message().clone();
            let tx = actor.model.completions_tx.clone();
            Reply::pending(async move {
                if let Some(tx) = tx {
                    // Ignore send errors - the driver may have moved on
                    let _ = tx.send(msg).await;
                }
            })
        });

        actor.act_on::<ObserverStateReport>(|actor, context| {
            let msg = context.message().clone();
            let tx = actor.model.reports_tx.clone();
            Reply::pending(async move {
                if let Some(tx) = tx {
                    let _ = tx.send(msg).await;
                }
            })
        });

        actor.start().await
    }
}

/// Observed steps times two classes (reduction and volume).
pub fn expected_completions(steps: u64, observe_every: u64) -> usize {
    if observe_every == 0 {
        return 0;
    }
    (steps / observe_every) as usize * 2
}

/// Run one full evolution and return its summary.
pub async fn run(config: RunConfig) -> Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let mut runtime = ActonApp::launch_async().await;

    let writer = ObserverWriter::initialize(&config.output_dir)?;
    let observer = ObserverAggregator::new(writer.clone())
        .spawn(&mut runtime)
        .await;

    let (completions_tx, mut completions_rx) = mpsc::channel(256);
    let (reports_tx, mut reports_rx) = mpsc::channel(16);
    CompletionBridge::new(completions_tx, reports_tx)
        .spawn(&mut runtime)
        .await;

    let source = LineDomainSource {
        blocks: config.blocks,
        refinement: config.refinement,
        points: config.points,
    };
    let pipeline = ActionList::builder()
        .then(AdvectionStep {
            velocity: config.velocity,
            seed: config.seed,
        })
        .then(ObserveField {
            period: config.observe_every,
        })
        .register_with_observer(TypeOfObservation::ReductionAndVolume)
        .build();
    let array_config = ArrayConfig {
        local_time_stepping: config.local_time_stepping,
        ..ArrayConfig::default()
    };
    let pool = config
        .workers
        .map(WorkerPool::with_count)
        .unwrap_or_else(WorkerPool::detect);
    let stepper: Box<dyn TimeStepper> = match config.stepper {
        StepperChoice::RungeKutta4 => Box::new(RungeKutta4),
        StepperChoice::AdamsBashforth2 => Box::new(AdamsBashforth { order: 2 }),
    };

    let array = match ElementArray::initialize(
        &mut runtime,
        &source,
        pipeline,
        stepper.as_ref(),
        &array_config,
        observer.clone(),
        pool,
        config.initial_time,
        config.initial_dt,
        config.initial_slab_size,
    )
    .await
    {
        Ok(array) => array,
        Err(error) => {
            if let Err(shutdown_error) = runtime.shutdown_all().await {
                warn!(?shutdown_error, "Runtime shutdown reported an error");
            }
            return Err(error.into());
        }
    };

    info!(
        run_id = %run_id,
        elements = array.len(),
        workers = array.worker_count(),
        "Element array initialized"
    );

    array.execute_next_phase(Phase::Initialize).await;
    array.execute_next_phase(Phase::RegisterWithObserver).await;

    // Registration dispatch is fire-and-forget; wait on the aggregator's
    // own registry before evolving so no contribution can outrun its
    // registration.
    wait_for_registration(&observer, &mut reports_rx, array.len()).await?;

    for _ in 0..config.steps {
        array.execute_next_phase(Phase::Evolve).await;
    }

    let expected = expected_completions(config.steps, config.observe_every);
    let observations_completed = wait_for_completions(&mut completions_rx, expected).await?;

    array.execute_next_phase(Phase::Exit).await;
    if let Err(error) = runtime.shutdown_all().await {
        warn!(?error, "Runtime shutdown reported an error");
    }

    Ok(RunSummary {
        run_id,
        elements: array.len(),
        workers: array.worker_count(),
        observations_completed,
        output_dir: config.output_dir,
    })
}

/// Poll the aggregator until every element's registration has landed.
async fn wait_for_registration(
    observer: &ActorHandle,
    reports: &mut mpsc::Receiver<ObserverStateReport>,
    expected: usize,
) -> Result<()> {
    let deadline = Duration::from_secs(30);
    timeout(deadline, async {
        loop {
            observer
                .send(QueryObserverState {
                    correlation_id: "registration".create_type_id::<V7>().to_string(),
                })
                .await;
            tokio::time::sleep(Duration::from_millis(25)).await;
            let mut registered = 0;
            while let Ok(report) = reports.try_recv() {
                registered = registered.max(report.number_of_events);
            }
            if registered >= expected {
                return;
            }
        }
    })
    .await
    .map_err(|_| anyhow!("registration did not complete within {deadline:?}"))
}

/// Count `ObservationComplete` broadcasts until the expected number.
async fn wait_for_completions(
    completions: &mut mpsc::Receiver<ObservationComplete>,
    expected: usize,
) -> Result<usize> {
    if expected == 0 {
        return Ok(0);
    }
    let deadline = Duration::from_secs(60);
    let mut received = 0;
    let outcome = timeout(deadline, async {
        while received < expected {
            match completions.recv().await {
                Some(_) => received += 1,
                None => break,
            }
        }
    })
    .await;
    if outcome.is_err() {
        return Err(anyhow!(
            "only {received} of {expected} observations completed within {deadline:?}"
        ));
    }
    Ok(received)
}
