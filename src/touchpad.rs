//! Touchpad widget: one engine plus the collaborators it talks to
//!
//! The touchpad feeds samples to its [`Engine`], re-emits the results through
//! an [`EventSink`], and forwards capture requests to a [`CaptureAuthority`].
//! It also holds the in-release guard: listeners reacting to a synthesized
//! click may push samples back through the echo buffer, and any release echoed
//! while a release is being synthesized is dropped instead of counted twice.

use tracing::{debug, trace};

use crate::config::{ConfigError, CoordinateSpace, EngineConfig, TouchpadConfig};
use crate::engine::{Analog, ClickEvent, ContactId, Engine, EngineEvent, Rejection, Sample};
use crate::timer::{FiredTimer, ManualTimers, TimerService};
use crate::translate::{TouchEvent, TouchTranslator};

/// Receives the touchpad's semantic output
///
/// `click` and `double_click` get an echo buffer: samples pushed there are
/// dispatched to the same touchpad before the current release finishes.
pub trait EventSink {
    fn analog_updated(&mut self, id: ContactId, analog: Analog);

    fn click(&mut self, event: &ClickEvent, echo: &mut Vec<Sample>);

    fn double_click(&mut self, event: &ClickEvent, echo: &mut Vec<Sample>);

    /// Contact admitted for pass-through only (default: ignore)
    fn contact_rejected(&mut self, _id: ContactId, _reason: Rejection) {}
}

/// Grants exclusive pointer capture; the touchpad only asks
pub trait CaptureAuthority {
    fn begin_capture(&mut self, id: ContactId);
    fn end_capture(&mut self, id: ContactId);
}

/// Capture authority for hosts without a capture mechanism
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl CaptureAuthority for NoCapture {
    fn begin_capture(&mut self, _id: ContactId) {}
    fn end_capture(&mut self, _id: ContactId) {}
}

/// Sink that records everything it receives, in order
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<EngineEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clicks(&self) -> impl Iterator<Item = &ClickEvent> {
        self.events.iter().filter_map(|e| match e {
            EngineEvent::Click(click) => Some(click),
            _ => None,
        })
    }

    pub fn double_clicks(&self) -> impl Iterator<Item = &ClickEvent> {
        self.events.iter().filter_map(|e| match e {
            EngineEvent::DoubleClick(click) => Some(click),
            _ => None,
        })
    }
}

impl EventSink for RecordingSink {
    fn analog_updated(&mut self, id: ContactId, analog: Analog) {
        self.events.push(EngineEvent::AnalogUpdated { id, analog });
    }

    fn click(&mut self, event: &ClickEvent, _echo: &mut Vec<Sample>) {
        self.events.push(EngineEvent::Click(*event));
    }

    fn double_click(&mut self, event: &ClickEvent, _echo: &mut Vec<Sample>) {
        self.events.push(EngineEvent::DoubleClick(*event));
    }

    fn contact_rejected(&mut self, id: ContactId, reason: Rejection) {
        self.events.push(EngineEvent::ContactRejected { id, reason });
    }
}

/// The embedding widget: owns one engine and its collaborators
pub struct Touchpad<T: TimerService, S: EventSink, C: CaptureAuthority = NoCapture> {
    engine: Engine<T>,
    sink: S,
    capture: C,
    translator: Option<TouchTranslator>,
    /// Held while a release is being synthesized
    releasing: bool,
}

impl<T: TimerService, S: EventSink> Touchpad<T, S, NoCapture> {
    pub fn new(config: EngineConfig, space: CoordinateSpace, timers: T, sink: S) -> Self {
        Self {
            engine: Engine::new(config, space, timers),
            sink,
            capture: NoCapture,
            translator: None,
            releasing: false,
        }
    }

    /// Build from a file configuration, enabling touch translation if configured
    pub fn from_config(config: &TouchpadConfig, timers: T, sink: S) -> Self {
        let touchpad = Self::new(config.engine.clone(), config.surface, timers, sink);
        if config.touch.enabled {
            touchpad.with_touch_translation(config.touch.id_base)
        } else {
            touchpad
        }
    }
}

impl<T: TimerService, S: EventSink, C: CaptureAuthority> Touchpad<T, S, C> {
    /// Route capture requests to a host capture authority
    pub fn with_capture<C2: CaptureAuthority>(self, capture: C2) -> Touchpad<T, S, C2> {
        Touchpad {
            engine: self.engine,
            sink: self.sink,
            capture,
            translator: self.translator,
            releasing: self.releasing,
        }
    }

    /// Accept touch events, mapping touch identifiers to `id_base + identifier`
    pub fn with_touch_translation(mut self, id_base: i64) -> Self {
        self.translator = Some(TouchTranslator::new(id_base));
        self
    }

    pub fn engine(&self) -> &Engine<T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<T> {
        &mut self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    /// Apply a reflected attribute (`deadzoneradius`, `analogmax`, ...)
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        debug!("Attribute {} = {:?}", name, value);
        self.engine.set_attribute(name, value)
    }

    /// Apply a reloaded file configuration
    pub fn apply_config(&mut self, config: &TouchpadConfig) {
        self.engine.apply_config(config.engine.clone());
        self.engine.set_coordinate_space(config.surface);

        match (&self.translator, config.touch.enabled) {
            (None, true) => self.translator = Some(TouchTranslator::new(config.touch.id_base)),
            (Some(_), false) => self.translator = None,
            _ => {}
        }
    }

    /// Dispatch one raw pointer sample and everything listeners echo back
    pub fn dispatch(&mut self, sample: Sample) {
        let is_release = sample.is_release();
        if is_release && self.releasing {
            trace!("Release for contact {} echoed during click synthesis, dropped", sample.contact());
            return;
        }

        // Echoed presses and moves run inside the guard; only a release sets it
        if is_release {
            self.releasing = true;
        }

        let mut echo = Vec::new();
        for event in self.engine.handle(sample) {
            self.emit(event, &mut echo);
        }
        for echoed in echo {
            self.dispatch(echoed);
        }

        if is_release {
            self.releasing = false;
        }
    }

    /// Dispatch a touch event through the touch translator.
    ///
    /// Returns false when touch translation is not enabled.
    pub fn dispatch_touch(&mut self, event: &TouchEvent) -> bool {
        let Some(translator) = self.translator.as_mut() else {
            trace!("Touch event ignored: touch translation disabled");
            return false;
        };

        for sample in translator.translate(event) {
            self.dispatch(sample);
        }
        true
    }

    /// A timer reported by the host's timer service expired
    pub fn timer_fired(&mut self, fired: FiredTimer) {
        self.engine.timer_fired(fired);
    }

    fn emit(&mut self, event: EngineEvent, echo: &mut Vec<Sample>) {
        match event {
            EngineEvent::CaptureRequested { id } => self.capture.begin_capture(id),
            EngineEvent::CaptureReleased { id } => self.capture.end_capture(id),
            EngineEvent::ContactRejected { id, reason } => self.sink.contact_rejected(id, reason),
            EngineEvent::AnalogUpdated { id, analog } => self.sink.analog_updated(id, analog),
            EngineEvent::Click(click) => self.sink.click(&click, echo),
            EngineEvent::DoubleClick(click) => self.sink.double_click(&click, echo),
        }
    }
}

impl<S: EventSink, C: CaptureAuthority> Touchpad<ManualTimers, S, C> {
    /// Advance the virtual clock, firing every timer due by `now_ms` in order
    pub fn advance_to(&mut self, now_ms: u64) {
        while let Some(fired) = self.engine.timers_mut().pop_due(now_ms) {
            self.engine.timer_fired(fired);
        }
    }

    /// Fire every pending timer
    pub fn settle(&mut self) {
        while let Some(deadline) = self.engine.timers().next_deadline() {
            self.advance_to(deadline);
        }
    }
}
