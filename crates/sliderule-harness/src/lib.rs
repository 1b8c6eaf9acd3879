//! Scenario runner for the SlideRule record/messaging core (spec §8).
//!
//! Queue-only scenarios (FIFO delivery, fanout, opportunistic drop,
//! back-pressure) are expressed as data through [`ScenarioSet`]/[`Scenario`]
//! and executed by [`ScenarioRunner`]. The record-definition and dispatcher
//! seed scenarios are closer to code than data and live as ordinary
//! `#[test]`s in `tests/`.

pub mod scenario;

pub use scenario::{
    Scenario, ScenarioLoadError, ScenarioOutcome, ScenarioRunner, ScenarioSet, Step, StepTimeout, SubscriberKindDto,
};
