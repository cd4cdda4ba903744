//! Virtual analog touchpad
//!
//! Turns raw pointer and touch samples into joystick-style analog vectors and
//! synthesized click / double-click events.

pub mod config;
pub mod engine;
pub mod runtime;
pub mod script;
pub mod timer;
pub mod touchpad;
pub mod translate;

pub use config::{ConfigError, CoordinateSpace, EngineConfig, TouchpadConfig};
pub use engine::{Analog, ClickEvent, ContactId, Engine, EngineEvent, Point, Rejection, Sample};
pub use timer::{ManualTimers, TimerService};
pub use touchpad::{CaptureAuthority, EventSink, NoCapture, RecordingSink, Touchpad};
