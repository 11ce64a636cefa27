//! End-to-end evolution: distribute, register, evolve, observe, persist.

use std::path::PathBuf;

use advection_experiment::driver::{self, RunConfig, StepperChoice};
use element_kernel::writer::PersistedAggregates;

fn temp_output_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("evolution-test-{}-{}", tag, std::process::id()))
}

fn small_config(output_dir: PathBuf) -> RunConfig {
    RunConfig {
        blocks: 2,
        refinement: 1,
        points: 4,
        steps: 6,
        observe_every: 3,
        velocity: 0.5,
        seed: 7,
        initial_time: 0.0,
        initial_dt: 0.01,
        initial_slab_size: None,
        local_time_stepping: false,
        stepper: StepperChoice::RungeKutta4,
        workers: Some(2),
        output_dir,
    }
}

fn load(path: &std::path::Path) -> PersistedAggregates {
    let bytes = std::fs::read(path).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_run_produces_persisted_aggregates() {
    let dir = temp_output_dir("persisted");
    let _ = std::fs::remove_dir_all(&dir);

    let summary = driver::run(small_config(dir.clone())).await.unwrap();

    // 2 blocks x 2^1 elements, 6 steps observed every 3 = 2 observations,
    // each completing once per output class.
    assert_eq!(summary.elements, 4);
    assert_eq!(summary.workers, 2);
    assert_eq!(summary.observations_completed, 4);

    let reductions = load(&dir.join("reductions.json"));
    assert_eq!(reductions.observations.len(), 2);
    for data in reductions.observations.values() {
        // One folded norm per observation, summed over all four elements.
        assert_eq!(data.components()["l2_norm_squared"].len(), 1);
        assert!(data.components()["l2_norm_squared"][0] > 0.0);
    }

    let volumes = load(&dir.join("volumes.json"));
    assert_eq!(volumes.observations.len(), 2);
    for data in volumes.observations.values() {
        // Element-qualified components keep per-element buffers separate.
        assert_eq!(data.components().len(), 4);
        for buffer in data.components().values() {
            assert_eq!(buffer.len(), 4);
        }
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_repeat_runs_are_bit_identical() {
    let first_dir = temp_output_dir("repeat-a");
    let second_dir = temp_output_dir("repeat-b");
    let _ = std::fs::remove_dir_all(&first_dir);
    let _ = std::fs::remove_dir_all(&second_dir);

    driver::run(small_config(first_dir.clone())).await.unwrap();
    driver::run(small_config(second_dir.clone())).await.unwrap();

    // Seeded initial data plus order-invariant aggregation: the persisted
    // output is byte-for-byte reproducible.
    let first = std::fs::read(first_dir.join("reductions.json")).unwrap();
    let second = std::fs::read(second_dir.join("reductions.json")).unwrap();
    assert_eq!(first, second);

    let first = std::fs::read(first_dir.join("volumes.json")).unwrap();
    let second = std::fs::read(second_dir.join("volumes.json")).unwrap();
    assert_eq!(first, second);

    let _ = std::fs::remove_dir_all(&first_dir);
    let _ = std::fs::remove_dir_all(&second_dir);
}

#[tokio::test]
async fn test_local_stepping_with_multistep_integrator_is_rejected() {
    let dir = temp_output_dir("rejected");
    let _ = std::fs::remove_dir_all(&dir);

    let config = RunConfig {
        local_time_stepping: true,
        stepper: StepperChoice::AdamsBashforth2,
        ..small_config(dir.clone())
    };
    let result = driver::run(config).await;
    assert!(result.is_err());

    // Eager validation: nothing was evolved, so nothing was persisted.
    assert!(!dir.join("reductions.json").exists());
    assert!(!dir.join("volumes.json").exists());

    let _ = std::fs::remove_dir_all(&dir);
}
