//! Data-driven queue scenarios (spec §8's FIFO/fanout/opportunistic-drop/
//! back-pressure seed tests), loaded from JSON a la the teacher's
//! `FixtureSet`.
//!
//! Scenarios that are more naturally expressed as code than data — the
//! variable-length-record role scan and the dispatcher routing test — live
//! as plain `#[test]`s in `tests/` instead of here.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sliderule::{Publisher, QState, QueueSize, Subscriber, SubscriberType, Timeout};

/// Errors loading a [`ScenarioSet`] from disk.
#[derive(Debug, Error)]
pub enum ScenarioLoadError {
    #[error("reading scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing scenario JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A named collection of [`Scenario`]s, the unit a JSON fixture file holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ScenarioLoadError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

/// One end-to-end queue scenario: a publisher, zero or more named
/// subscribers, and a sequence of steps run against them in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Queue name. Scenarios run against a uniquely-suffixed name derived
    /// from this so repeated runs in the same process never collide in the
    /// queue registry.
    pub queue: String,
    pub depth: usize,
    pub max_data_size: usize,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberKindDto {
    Confidence,
    Opportunity,
}

impl From<SubscriberKindDto> for SubscriberType {
    fn from(kind: SubscriberKindDto) -> Self {
        match kind {
            SubscriberKindDto::Confidence => SubscriberType::Confidence,
            SubscriberKindDto::Opportunity => SubscriberType::Opportunity,
        }
    }
}

/// A single action in a [`Scenario`]. Each variant names the handle it
/// operates on by string so a scenario can juggle several subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Attaches a named subscriber handle before any posts happen.
    Subscribe { handle: String, kind: SubscriberKindDto },
    /// Posts a little-endian `u32` by copy, with `Check`/`Pend`/a millisecond
    /// timeout.
    Post { value: u32, timeout: StepTimeout },
    /// Posts and asserts the post result is `Full`.
    ExpectPostFull { value: u32 },
    /// Receives on `handle` by copy and asserts the decoded value.
    ExpectReceive {
        handle: String,
        value: u32,
        timeout: StepTimeout,
    },
    /// Receives on `handle` and asserts `Empty`.
    ExpectEmpty { handle: String, timeout: StepTimeout },
    /// Sleeps, modeling a slow subscriber for back-pressure scenarios.
    Sleep { millis: u64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "millis")]
pub enum StepTimeout {
    Check,
    Pend,
    After(u64),
}

impl From<StepTimeout> for Timeout {
    fn from(t: StepTimeout) -> Self {
        match t {
            StepTimeout::Check => Timeout::Check,
            StepTimeout::Pend => Timeout::Pend,
            StepTimeout::After(ms) => Timeout::After(Duration::from_millis(ms)),
        }
    }
}

/// The result of running one [`Scenario`], shaped for a scenario-replay CLI
/// report.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub passed: bool,
    pub failure: Option<String>,
}

/// Executes [`Scenario`]s against the real queue fabric.
pub struct ScenarioRunner;

impl ScenarioRunner {
    /// Runs every scenario in `set`, in order, returning one outcome per
    /// scenario. A failing scenario does not stop the others.
    #[must_use]
    pub fn run_set(set: &ScenarioSet) -> Vec<ScenarioOutcome> {
        set.scenarios.iter().map(Self::run).collect()
    }

    #[must_use]
    pub fn run(scenario: &Scenario) -> ScenarioOutcome {
        tracing::debug!(scenario = %scenario.name, steps = scenario.steps.len(), "running scenario");
        match run_steps(scenario) {
            Ok(()) => {
                tracing::info!(scenario = %scenario.name, "scenario passed");
                ScenarioOutcome {
                    name: scenario.name.clone(),
                    passed: true,
                    failure: None,
                }
            }
            Err(reason) => {
                tracing::warn!(scenario = %scenario.name, %reason, "scenario failed");
                ScenarioOutcome {
                    name: scenario.name.clone(),
                    passed: false,
                    failure: Some(reason),
                }
            }
        }
    }
}

fn run_steps(scenario: &Scenario) -> Result<(), String> {
    // A process-unique suffix keeps repeated scenario runs (e.g. from
    // `cargo test` retries) from colliding on the global queue registry.
    static RUN_SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let seq = RUN_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let queue_name = format!("{}-{seq}", scenario.queue);

    let publisher = Publisher::new(&queue_name, QueueSize::Depth(scenario.depth), QueueSize::Depth(scenario.max_data_size));
    let mut subscribers: HashMap<String, Subscriber> = HashMap::new();

    for step in &scenario.steps {
        match step {
            Step::Subscribe { handle, kind } => {
                let sub = Subscriber::new(
                    &queue_name,
                    (*kind).into(),
                    QueueSize::Depth(scenario.depth),
                    QueueSize::Depth(scenario.max_data_size),
                );
                subscribers.insert(handle.clone(), sub);
            }
            Step::Post { value, timeout } => {
                publisher
                    .post_copy(&value.to_le_bytes(), (*timeout).into())
                    .map_err(|e| format!("post({value}) failed: {e:?}"))?;
            }
            Step::ExpectPostFull { value } => {
                let result = publisher.post_copy(&value.to_le_bytes(), Timeout::Check);
                if result != Err(QState::Full) {
                    return Err(format!("expected Full posting {value}, got {result:?}"));
                }
            }
            Step::ExpectReceive { handle, value, timeout } => {
                let sub = subscribers
                    .get(handle)
                    .ok_or_else(|| format!("no subscriber named '{handle}'"))?;
                let mut buf = [0u8; 4];
                let n = sub
                    .receive_copy(&mut buf, (*timeout).into())
                    .map_err(|e| format!("receive on '{handle}' failed: {e:?}"))?;
                if n != 4 {
                    return Err(format!("receive on '{handle}' returned {n} bytes, expected 4"));
                }
                let got = u32::from_le_bytes(buf);
                if got != *value {
                    return Err(format!("receive on '{handle}' got {got}, expected {value}"));
                }
            }
            Step::ExpectEmpty { handle, timeout } => {
                let sub = subscribers
                    .get(handle)
                    .ok_or_else(|| format!("no subscriber named '{handle}'"))?;
                let mut buf = [0u8; 4];
                let result = sub.receive_copy(&mut buf, (*timeout).into());
                if !matches!(result, Err(QState::Empty) | Err(QState::Timeout)) {
                    return Err(format!("expected Empty/Timeout on '{handle}', got {result:?}"));
                }
            }
            Step::Sleep { millis } => {
                std::thread::sleep(Duration::from_millis(*millis));
            }
        }
    }
    Ok(())
}
