//! Scripted integration run for manual verification on real hardware.
//!
//! Walks the display through every visible feature with a fixed pause
//! between steps so an operator can watch the result: date/time, a
//! brightness sweep, each clock mode, a few lighting colours and the climate
//! indicators. It finishes by restoring the current time and a plain white
//! clock.
//!
//! There is no state machine here; each step is an ordinary
//! [`Bridge::execute`] call.

use std::time::Duration;

use lumen_types::{BridgeError, Settings};
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::Bridge;

/// Pause between steps when the caller does not pick one.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(2000);

/// One scripted step: a command name and its settings.
#[derive(Debug, Clone)]
pub struct Step {
    pub command: &'static str,
    pub settings: Settings,
}

impl Step {
    fn new(command: &'static str, fields: &[(&str, Value)]) -> Self {
        let mut settings = Settings::new();
        for (name, value) in fields {
            settings.insert(*name, value.clone());
        }
        Self { command, settings }
    }
}

/// Outcome of [`run_integration`].
#[derive(Debug, Default)]
pub struct ScenarioReport {
    pub steps: usize,
    pub failures: Vec<(&'static str, BridgeError)>,
}

impl ScenarioReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The full step list, in execution order.
pub fn integration_steps() -> Vec<Step> {
    let mut steps = Vec::new();

    // date/time
    steps.push(Step::new("datetime", &[]));
    steps.push(Step::new("datetime", &[("fulldayMode", Value::Bool(true))]));
    steps.push(Step::new("datetime", &[("fulldayMode", Value::Bool(false))]));

    // brightness sweep
    for level in [10, 40, 70, 100, 50] {
        steps.push(Step::new("brightness", &[("level", Value::from(level))]));
    }

    // clock modes
    for mode in 1..=6 {
        steps.push(Step::new(
            "clock",
            &[
                ("mode", Value::from(mode)),
                ("showTime", Value::Bool(true)),
                ("showWeather", Value::Bool(true)),
                ("showTemperature", Value::Bool(true)),
                ("showCalendar", Value::Bool(true)),
                ("color", Value::from("00ff00")),
            ],
        ));
    }

    // lighting
    for color in ["ff0000", "00ff00", "0000ff"] {
        steps.push(Step::new(
            "lighting",
            &[
                ("color", Value::from(color)),
                ("brightness", Value::from(80)),
                ("mode", Value::from(1)),
                ("powerScreen", Value::Bool(true)),
            ],
        ));
    }

    // climate
    for weather in 1..=4 {
        steps.push(Step::new(
            "climate",
            &[
                ("weather", Value::from(weather)),
                ("temperature", Value::from(weather * 5 - 10)),
            ],
        ));
    }

    // restore
    steps.push(Step::new("datetime", &[]));
    steps.push(Step::new(
        "clock",
        &[
            ("mode", Value::from(6)),
            ("showTime", Value::Bool(true)),
            ("showWeather", Value::Bool(false)),
            ("showTemperature", Value::Bool(false)),
            ("showCalendar", Value::Bool(false)),
            ("color", Value::from("ffffff")),
        ],
    ));
    steps
}

/// Run every step of [`integration_steps`] in order, sleeping `delay`
/// between consecutive steps. A failing step is recorded and the run
/// continues.
pub async fn run_integration(bridge: &Bridge, delay: Duration) -> ScenarioReport {
    let steps = integration_steps();
    let total = steps.len();
    let mut report = ScenarioReport::default();
    info!(steps = total, delay_ms = delay.as_millis() as u64, "integration run started");

    for (index, step) in steps.into_iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = match bridge.table().lookup(step.command) {
            Ok(command) => bridge.execute(command, step.settings).await,
            Err(e) => Err(e),
        };
        report.steps += 1;
        if let Err(e) = result {
            warn!(step = index, command = step.command, error = %e, "integration step failed");
            report.failures.push((step.command, e));
        }
    }

    info!(failures = report.failures.len(), "integration run finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_hal::{SimConnection, SimDevice};
    use std::sync::Arc;

    #[test]
    fn every_step_names_a_known_command() {
        let table = crate::CommandTable::new();
        for step in integration_steps() {
            assert!(table.lookup(step.command).is_ok(), "{}", step.command);
        }
    }

    #[test]
    fn run_ends_with_white_clock_in_mode_six() {
        let steps = integration_steps();
        let last = steps.last().unwrap();
        assert_eq!(last.command, "clock");
        assert_eq!(last.settings.get_i64("mode"), Some(6));
        assert_eq!(last.settings.get_str("color"), Some("ffffff"));
        assert_eq!(last.settings.get_bool("showWeather"), Some(false));
        assert_eq!(steps[steps.len() - 2].command, "datetime");
    }

    #[tokio::test]
    async fn run_writes_every_step_in_order() {
        let link = Arc::new(SimConnection::new().connected(true));
        let bridge = Bridge::new(Arc::new(SimDevice::new()), link.clone(), true);

        let report = run_integration(&bridge, Duration::ZERO).await;
        assert!(report.passed());
        assert_eq!(report.steps, integration_steps().len());

        // One extra write for the datetime step carrying fulldayMode=true and
        // one for fulldayMode=false.
        let writes = link.decoded_writes();
        assert_eq!(writes.len(), report.steps + 2);
        assert_eq!(writes.first().unwrap().0, "datetime");
        assert_eq!(writes.last().unwrap().0, "clock");
    }

    #[tokio::test(start_paused = true)]
    async fn run_pauses_between_steps() {
        let link = Arc::new(SimConnection::new().connected(true));
        let bridge = Bridge::new(Arc::new(SimDevice::new()), link, true);

        let started = tokio::time::Instant::now();
        let report = run_integration(&bridge, Duration::from_millis(100)).await;
        let expected = Duration::from_millis(100) * (report.steps as u32 - 1);
        assert_eq!(started.elapsed(), expected);
    }

    #[tokio::test]
    async fn failures_are_collected_and_run_continues() {
        let link = Arc::new(SimConnection::new());
        let bridge = Bridge::new(Arc::new(SimDevice::new()), link, true);

        let report = run_integration(&bridge, Duration::ZERO).await;
        assert_eq!(report.steps, integration_steps().len());
        assert_eq!(report.failures.len(), report.steps);
    }
}
