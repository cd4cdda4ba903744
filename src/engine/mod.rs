//! Pointer/analog tracking engine
//!
//! Routes raw samples to the contact tracker (analog follow solver) and the
//! click classifier, and returns what the embedding widget should re-emit.
//! All work is synchronous; timer expiries come back through [`Engine::timer_fired`].

pub mod click;
pub mod follow;
pub mod tracker;
pub mod types;

#[cfg(test)]
mod tests;

use tracing::{debug, trace};

use crate::config::{CoordinateSpace, EngineConfig};
use crate::timer::{FiredTimer, TimerService};

pub use click::{ButtonState, ClickClassifier};
pub use follow::{AnalogState, Bounds, Radii};
pub use tracker::{ContactState, ContactTracker};
pub use types::{Analog, ClickEvent, ContactId, EngineEvent, Point, Rejection, Sample, MAX_BUTTON};

/// One engine per touch surface
pub struct Engine<T: TimerService> {
    config: EngineConfig,
    space: CoordinateSpace,
    tracker: ContactTracker,
    clicks: ClickClassifier,
    timers: T,
}

impl<T: TimerService> Engine<T> {
    pub fn new(config: EngineConfig, space: CoordinateSpace, timers: T) -> Self {
        let tracker = ContactTracker::new(config.max_concurrent_contacts());
        Self {
            config,
            space: space.sanitized(),
            tracker,
            clicks: ClickClassifier::new(),
            timers,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn clicks(&self) -> &ClickClassifier {
        &self.clicks
    }

    /// Live analog state of a tracked contact
    pub fn contact(&self, id: ContactId) -> Option<&ContactState> {
        self.tracker.get(id)
    }

    /// Current analog vector of a tracked contact
    pub fn analog(&self, id: ContactId) -> Option<Analog> {
        self.tracker.get(id).map(|c| c.analog.analog)
    }

    /// Tracked contact ids, earliest admission first
    pub fn tracked_ids(&self) -> Vec<ContactId> {
        self.tracker.ids().collect()
    }

    /// Replace the configuration; applies to subsequent samples only,
    /// except that a smaller capacity evicts contacts immediately.
    pub fn apply_config(&mut self, config: EngineConfig) {
        let capacity = config.max_concurrent_contacts();
        self.config = config;
        self.set_max_concurrent_contacts(capacity);
    }

    /// Apply a reflected attribute value (see [`EngineConfig::set_attribute`])
    pub fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), crate::config::ConfigError> {
        self.config.set_attribute(name, value)?;
        self.set_max_concurrent_contacts(self.config.max_concurrent_contacts());
        Ok(())
    }

    /// Change the analog capacity, evicting the latest admitted contacts first
    pub fn set_max_concurrent_contacts(&mut self, max: usize) -> Vec<ContactId> {
        self.config.set_max_concurrent_contacts(max);
        self.tracker.set_capacity(max)
    }

    /// Surface moved or resized; affects subsequent samples only
    pub fn set_coordinate_space(&mut self, space: CoordinateSpace) {
        let space = space.sanitized();
        debug!("Coordinate space changed to {:?}", space);
        self.space = space;
    }

    /// Process one raw sample
    pub fn handle(&mut self, sample: Sample) -> Vec<EngineEvent> {
        trace!("Sample {:?}", sample);
        match sample {
            Sample::ContactStart { id, x, y, .. } => self.contact_start(id, x, y),
            Sample::ContactMove { id, x, y, movement_x, movement_y, .. } => {
                self.contact_move(id, x, y, (movement_x, movement_y))
            }
            Sample::ContactEnd { id } => self.contact_end(id),
            Sample::ButtonDown { id, button, x, y, .. } => self.button_down(id, button, x, y),
            Sample::ButtonUp { id, button, x, y, .. } => self.button_up(id, button, x, y),
        }
    }

    /// Begin capture and, capacity permitting, analog tracking
    pub fn contact_start(&mut self, id: ContactId, x: f64, y: f64) -> Vec<EngineEvent> {
        let position = self.space.to_local(x, y);
        let mut events = vec![EngineEvent::CaptureRequested { id }];

        match self.tracker.start(id, position) {
            Ok(()) => events.push(EngineEvent::AnalogUpdated { id, analog: Analog::CENTERED }),
            Err(reason) => events.push(EngineEvent::ContactRejected { id, reason }),
        }

        events
    }

    pub fn contact_move(&mut self, id: ContactId, x: f64, y: f64, movement: (f64, f64)) -> Vec<EngineEvent> {
        let position = self.space.to_local(x, y);

        match self.tracker.update(id, position, movement, self.config.radii(), self.space.bounds()) {
            Some(analog) => {
                trace!("Contact {} analog ({}, {})", id, analog.x, analog.y);
                vec![EngineEvent::AnalogUpdated { id, analog }]
            }
            None => Vec::new(),
        }
    }

    /// Drop analog state and release capture. Ending an unknown id only releases capture.
    pub fn contact_end(&mut self, id: ContactId) -> Vec<EngineEvent> {
        if self.tracker.end(id).is_some() {
            debug!("Contact {} ended", id);
        }
        self.clicks.end_contact(id, &mut self.timers);

        vec![EngineEvent::CaptureReleased { id }]
    }

    pub fn button_down(&mut self, id: ContactId, button: u8, x: f64, y: f64) -> Vec<EngineEvent> {
        if button > MAX_BUTTON {
            trace!("Contact {} button {} out of range, ignored", id, button);
            return Vec::new();
        }

        let position = self.space.to_local(x, y);
        self.clicks.press(id, button, position, &self.config, &mut self.timers);
        Vec::new()
    }

    pub fn button_up(&mut self, id: ContactId, button: u8, x: f64, y: f64) -> Vec<EngineEvent> {
        if button > MAX_BUTTON {
            trace!("Contact {} button {} out of range, ignored", id, button);
            return Vec::new();
        }

        let position = self.space.to_local(x, y);
        self.clicks.release(id, button, position, &self.config, &mut self.timers)
    }

    /// A scheduled timer expired. Stale handles are ignored.
    ///
    /// Expiries only decay state, they never emit events.
    pub fn timer_fired(&mut self, fired: FiredTimer) {
        self.clicks.timer_fired(fired);
    }

    /// Cancel all timers and forget every contact
    pub fn reset(&mut self) {
        self.tracker.set_capacity(0);
        self.tracker.set_capacity(self.config.max_concurrent_contacts());
        self.clicks.clear(&mut self.timers);
    }
}
