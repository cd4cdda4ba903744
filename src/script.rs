//! Replayable input scripts
//!
//! A script is a time-ordered list of steps, each carrying a pointer sample, a
//! touch event, or an attribute change:
//!
//! ```yaml
//! steps:
//!   - at_ms: 0
//!     pointer: { type: contact_start, id: 1, x: 0, y: 0 }
//!   - at_ms: 16
//!     pointer: { type: contact_move, id: 1, x: 100, y: 0 }
//!   - at_ms: 20
//!     attribute: { name: analogmax, value: "0" }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::is_json;
use crate::engine::Sample;
use crate::timer::{ManualTimers, TimerService};
use crate::touchpad::{CaptureAuthority, EventSink, Touchpad};
use crate::translate::TouchEvent;

/// Input carried by one script step
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptInput {
    Pointer(Sample),
    Touch(TouchEvent),
    Attribute { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: ScriptInput,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Script {
    pub steps: Vec<ScriptStep>,
}

impl Script {
    /// Load a YAML or JSON script (chosen by extension)
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script: {}", path.display()))?;

        let script: Script = if is_json(path) {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON script: {}", path.display()))?
        } else {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML script: {}", path.display()))?
        };

        script.validate()?;
        Ok(script)
    }

    /// Steps must be in non-decreasing time order
    pub fn validate(&self) -> Result<()> {
        for pair in self.steps.windows(2) {
            if pair[1].at_ms < pair[0].at_ms {
                anyhow::bail!(
                    "Script steps out of order: {}ms follows {}ms",
                    pair[1].at_ms,
                    pair[0].at_ms
                );
            }
        }
        Ok(())
    }

    /// Time of the last step
    pub fn duration_ms(&self) -> u64 {
        self.steps.last().map(|s| s.at_ms).unwrap_or(0)
    }
}

/// Apply one step's input to a touchpad
pub fn apply_step<T, S, C>(touchpad: &mut Touchpad<T, S, C>, step: &ScriptStep)
where
    T: TimerService,
    S: EventSink,
    C: CaptureAuthority,
{
    match &step.input {
        ScriptInput::Pointer(sample) => touchpad.dispatch(*sample),
        ScriptInput::Touch(event) => {
            if !touchpad.dispatch_touch(event) {
                warn!("Touch step at {}ms skipped: touch translation disabled", step.at_ms);
            }
        }
        ScriptInput::Attribute { name, value } => {
            if let Err(e) = touchpad.set_attribute(name, value) {
                warn!("Attribute step at {}ms skipped: {}", step.at_ms, e);
            }
        }
    }
}

/// Replay a script on the virtual clock, then let every pending window expire
pub fn replay<S, C>(touchpad: &mut Touchpad<ManualTimers, S, C>, script: &Script)
where
    S: EventSink,
    C: CaptureAuthority,
{
    for step in &script.steps {
        touchpad.advance_to(step.at_ms);
        debug!("Replaying step at {}ms", step.at_ms);
        apply_step(touchpad, step);
    }
    touchpad.settle();
}
