//! Value types shared by the tracker, the follow solver and the click classifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest button index tracked per contact (primary, auxiliary, secondary, back, forward)
pub const MAX_BUTTON: u8 = 4;

/// Opaque contact identifier (pointer id or translated touch identifier)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ContactId(pub i64);

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A 2D position in surface coordinates (pixels)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Move toward `target` by `step` along the straight line joining them.
    ///
    /// Callers guarantee `self != target`.
    pub fn toward(self, target: Point, step: f64) -> Point {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        let scale = step / dx.hypot(dy);

        Point {
            x: self.x + dx * scale,
            y: self.y + dy * scale,
        }
    }
}

/// Normalized stick vector, each component in [-1, 1] and quantized to 0.01
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Analog {
    pub x: f64,
    pub y: f64,
}

impl Analog {
    pub const CENTERED: Analog = Analog { x: 0.0, y: 0.0 };
}

/// Raw input sample fed by the input source
///
/// `timestamp` is advisory: it is carried for logging and recorded scripts,
/// but click and double-click windows are measured by the [`TimerService`]
/// alone, so samples with missing or skewed timestamps classify the same.
///
/// [`TimerService`]: crate::timer::TimerService
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Sample {
    ContactStart {
        id: ContactId,
        x: f64,
        y: f64,
        #[serde(default)]
        timestamp: u64,
    },
    ContactMove {
        id: ContactId,
        x: f64,
        y: f64,
        #[serde(default)]
        movement_x: f64,
        #[serde(default)]
        movement_y: f64,
        #[serde(default)]
        timestamp: u64,
    },
    ContactEnd {
        id: ContactId,
    },
    ButtonDown {
        id: ContactId,
        #[serde(default)]
        button: u8,
        x: f64,
        y: f64,
        #[serde(default)]
        timestamp: u64,
    },
    ButtonUp {
        id: ContactId,
        #[serde(default)]
        button: u8,
        x: f64,
        y: f64,
        #[serde(default)]
        timestamp: u64,
    },
}

impl Sample {
    /// Contact the sample belongs to
    pub fn contact(&self) -> ContactId {
        match *self {
            Sample::ContactStart { id, .. }
            | Sample::ContactMove { id, .. }
            | Sample::ContactEnd { id }
            | Sample::ButtonDown { id, .. }
            | Sample::ButtonUp { id, .. } => id,
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Sample::ButtonUp { .. })
    }
}

/// Synthesized click or double-click
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClickEvent {
    pub id: ContactId,
    pub button: u8,
    /// Running click count within the double-click window
    pub count: u32,
    pub position: Point,
}

/// Why a contact was not given analog tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum Rejection {
    #[error("analog capacity of {max} concurrent contacts exceeded")]
    CapacityExceeded { max: usize },
}

/// Output produced by the engine for a single sample or timer expiry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Exclusive capture of the contact should begin
    CaptureRequested { id: ContactId },
    /// Capture of the contact should end
    CaptureReleased { id: ContactId },
    /// Contact accepted for pass-through only; no analog state was created
    ContactRejected { id: ContactId, reason: Rejection },
    AnalogUpdated { id: ContactId, analog: Analog },
    Click(ClickEvent),
    DoubleClick(ClickEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toward_moves_exact_step() {
        let p = Point::new(0.0, 0.0).toward(Point::new(3.0, 4.0), 2.5);
        assert!((p.x - 1.5).abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sample_parses_from_yaml() {
        let sample: Sample = serde_yaml::from_str("type: button_up\nid: 3\nbutton: 2\nx: 1.5\ny: 4\n").unwrap();
        assert_eq!(
            sample,
            Sample::ButtonUp { id: ContactId(3), button: 2, x: 1.5, y: 4.0, timestamp: 0 }
        );
        assert!(sample.is_release());
        assert_eq!(sample.contact(), ContactId(3));
    }
}
