//! Analog follow solver (control circle + deadzone circle)
//!
//! The control circle models the joystick housing: it is only dragged once the
//! raw contact position leaves a slack radius of `control + deadzone` around it.
//! The deadzone circle models the stick tip: it chases the raw position with a
//! slack of `deadzone` and is kept within `control` of the control center.
//!
//! The analog vector is the offset between the two centers divided by the
//! control radius, rounded to two decimals.

use super::types::{Analog, Point};

/// Circle radii used by the solver. Both are at least 1 (see `EngineConfig`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Radii {
    pub control: f64,
    pub deadzone: f64,
}

/// Surface box the control center is clamped to in local coordinate mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    /// Never panics; a degenerate box collapses the point onto its origin edge
    fn clamp(&self, p: Point) -> Point {
        Point {
            x: p.x.min(self.width).max(0.0),
            y: p.y.min(self.height).max(0.0),
        }
    }
}

/// Geometric state of one tracked contact
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogState {
    pub control: Point,
    pub deadzone: Point,
    pub analog: Analog,
}

impl AnalogState {
    /// Both centers start on the contact position with a centered stick
    pub fn at(position: Point) -> Self {
        Self {
            control: position,
            deadzone: position,
            analog: Analog::CENTERED,
        }
    }

    /// Advance the state toward a new raw position and return the new analog vector
    pub fn follow(&mut self, target: Point, radii: Radii, bounds: Option<Bounds>) -> Analog {
        // Control circle: dragged only once the target leaves the combined slack
        let slack = radii.control + radii.deadzone;
        let distance = self.control.distance(target);
        if distance > slack {
            self.control = self.control.toward(target, distance - slack);
        }

        if let Some(bounds) = bounds {
            self.control = bounds.clamp(self.control);
        }

        let distance = self.deadzone.distance(target);
        if distance > radii.deadzone {
            self.deadzone = self.deadzone.toward(target, distance - radii.deadzone);
        }

        constrain_deadzone(self.control, &mut self.deadzone, radii.control);

        self.analog = derive_analog(self.control, self.deadzone, radii.control);
        self.analog
    }
}

/// Pull the deadzone center back inside the control circle.
///
/// Runs after every deadzone step, and also after a bounding clamp moved the
/// control center away from a deadzone that did not move.
pub fn constrain_deadzone(control: Point, deadzone: &mut Point, control_radius: f64) {
    let distance = control.distance(*deadzone);
    if distance > control_radius {
        *deadzone = deadzone.toward(control, distance - control_radius);
    }
}

/// Offset between the centers over the control radius, quantized to 0.01
pub fn derive_analog(control: Point, deadzone: Point, control_radius: f64) -> Analog {
    Analog {
        x: round2((deadzone.x - control.x) / control_radius).clamp(-1.0, 1.0),
        y: round2((deadzone.y - control.y) / control_radius).clamp(-1.0, 1.0),
    }
}

/// Round to the nearest hundredth, ties toward positive infinity
pub fn round2(value: f64) -> f64 {
    (value * 100.0 + 0.5).floor() / 100.0
}
