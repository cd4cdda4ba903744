//! Click / double-click classification per (contact, button)
//!
//! ```text
//!            press                     release within click window
//!   Idle ─────────────▶ Pressed ───────────────────────────────────▶ Idle (+click)
//!                          │           and within click distance
//!                          │ click timer expires / release too far
//!                          ▼
//!                        Idle (hold or drag, nothing emitted)
//! ```
//!
//! A click opens (or re-opens) the double-click window. A click that lands
//! while the window is still open also emits a double-click carrying the same
//! running count, so triple and longer click trains keep reporting.
//! The count resets only when the window expires.

use std::collections::HashMap;
use tracing::{debug, trace};

use super::types::{ClickEvent, ContactId, EngineEvent, Point};
use crate::config::EngineConfig;
use crate::timer::{FiredTimer, TimerHandle, TimerKind, TimerService, TimerToken};

/// Click bookkeeping for one button of one contact
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonState {
    /// Position captured at the last press; `None` when not pressed
    pub down_position: Option<Point>,
    pub pressed: bool,
    pub click_count: u32,
    pub click_timer: Option<TimerHandle>,
    pub double_click_timer: Option<TimerHandle>,
}

impl ButtonState {
    /// Nothing pending; the record can be dropped
    pub fn is_idle(&self) -> bool {
        !self.pressed
            && self.click_count == 0
            && self.click_timer.is_none()
            && self.double_click_timer.is_none()
    }

    fn cancel_click_window(&mut self, timers: &mut dyn TimerService) {
        if let Some(handle) = self.click_timer.take() {
            timers.cancel(handle);
        }
    }

    fn cancel_double_click_window(&mut self, timers: &mut dyn TimerService) -> bool {
        match self.double_click_timer.take() {
            Some(handle) => {
                timers.cancel(handle);
                true
            }
            None => false,
        }
    }

    fn reset_press(&mut self) {
        self.pressed = false;
        self.down_position = None;
    }
}

/// Per (contact, button) click state machines
#[derive(Debug, Default)]
pub struct ClickClassifier {
    buttons: HashMap<(ContactId, u8), ButtonState>,
}

impl ClickClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a button, if any bookkeeping is pending for it
    pub fn button(&self, contact: ContactId, button: u8) -> Option<&ButtonState> {
        self.buttons.get(&(contact, button))
    }

    /// Number of (contact, button) records still held
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Button-down: open the click window
    pub fn press(
        &mut self,
        contact: ContactId,
        button: u8,
        position: Point,
        config: &EngineConfig,
        timers: &mut dyn TimerService,
    ) {
        let state = self.buttons.entry((contact, button)).or_default();

        // A repeated press replaces the previous window
        state.cancel_click_window(timers);

        state.down_position = Some(position);
        state.pressed = true;
        state.click_timer = Some(timers.schedule(
            config.click_time_ms(),
            TimerToken { contact, button, kind: TimerKind::Click },
        ));

        trace!("Contact {} button {} pressed at ({}, {})", contact, button, position.x, position.y);
    }

    /// Button-up: classify as click (possibly also double-click) or drag
    pub fn release(
        &mut self,
        contact: ContactId,
        button: u8,
        position: Point,
        config: &EngineConfig,
        timers: &mut dyn TimerService,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        let Some(state) = self.buttons.get_mut(&(contact, button)) else {
            trace!("Contact {} button {} released without a press", contact, button);
            return events;
        };

        let down = match (state.pressed, state.click_timer, state.down_position) {
            (true, Some(_), Some(down)) => down,
            _ => {
                trace!("Contact {} button {} released outside the click window", contact, button);
                state.reset_press();
                self.prune(contact, button);
                return events;
            }
        };

        state.cancel_click_window(timers);
        state.reset_press();

        let distance = down.distance(position);
        if distance > config.click_distance() {
            debug!(
                "Contact {} button {} moved {:.1}px > {}px, treating as drag",
                contact,
                button,
                distance,
                config.click_distance()
            );
            self.prune(contact, button);
            return events;
        }

        state.click_count += 1;
        let click = ClickEvent {
            id: contact,
            button,
            count: state.click_count,
            position,
        };
        events.push(EngineEvent::Click(click));

        if state.cancel_double_click_window(timers) {
            events.push(EngineEvent::DoubleClick(click));
        }

        state.double_click_timer = Some(timers.schedule(
            config.double_click_time_ms(),
            TimerToken { contact, button, kind: TimerKind::DoubleClick },
        ));

        debug!("Contact {} button {} click #{}", contact, button, click.count);
        events
    }

    /// Apply a timer expiry. Returns false for a stale or unknown timer.
    pub fn timer_fired(&mut self, fired: FiredTimer) -> bool {
        let TimerToken { contact, button, kind } = fired.token;

        let Some(state) = self.buttons.get_mut(&(contact, button)) else {
            trace!("Timer {} for released contact {} ignored", fired.handle, contact);
            return false;
        };

        let slot = match kind {
            TimerKind::Click => &mut state.click_timer,
            TimerKind::DoubleClick => &mut state.double_click_timer,
        };
        if *slot != Some(fired.handle) {
            trace!("Stale {:?} timer {} for contact {} ignored", kind, fired.handle, contact);
            return false;
        }
        *slot = None;

        match kind {
            TimerKind::Click => {
                debug!("Contact {} button {} held past the click window", contact, button);
                state.reset_press();
            }
            TimerKind::DoubleClick => {
                trace!("Contact {} button {} click count reset", contact, button);
                state.click_count = 0;
            }
        }

        self.prune(contact, button);
        true
    }

    /// Contact ended: unfinished presses become holds; pending double-click
    /// windows stay open so the same pointer id can still complete a double-click.
    pub fn end_contact(&mut self, contact: ContactId, timers: &mut dyn TimerService) {
        self.buttons.retain(|&(id, _), state| {
            if id != contact {
                return true;
            }
            state.cancel_click_window(timers);
            state.reset_press();
            !state.is_idle()
        });
    }

    /// Cancel every timer and forget all state
    pub fn clear(&mut self, timers: &mut dyn TimerService) {
        for state in self.buttons.values_mut() {
            state.cancel_click_window(timers);
            state.cancel_double_click_window(timers);
        }
        self.buttons.clear();
    }

    fn prune(&mut self, contact: ContactId, button: u8) {
        if self.buttons.get(&(contact, button)).is_some_and(ButtonState::is_idle) {
            self.buttons.remove(&(contact, button));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::ManualTimers;

    const ID: ContactId = ContactId(1);

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn click_at(
        classifier: &mut ClickClassifier,
        timers: &mut ManualTimers,
        down: Point,
        up: Point,
    ) -> Vec<EngineEvent> {
        classifier.press(ID, 0, down, &config(), timers);
        classifier.release(ID, 0, up, &config(), timers)
    }

    #[test]
    fn test_press_release_within_distance_is_click() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        let events = click_at(&mut classifier, &mut timers, Point::new(10.0, 10.0), Point::new(12.0, 11.0));

        assert_eq!(
            events,
            vec![EngineEvent::Click(ClickEvent { id: ID, button: 0, count: 1, position: Point::new(12.0, 11.0) })]
        );
        // Only the double-click window remains scheduled
        assert_eq!(timers.pending_count(), 1);
        assert_eq!(classifier.button(ID, 0).map(|s| s.click_count), Some(1));
    }

    #[test]
    fn test_drag_emits_nothing() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        let events = click_at(&mut classifier, &mut timers, Point::ORIGIN, Point::new(50.0, 50.0));

        assert!(events.is_empty());
        assert_eq!(timers.pending_count(), 0);
        assert!(classifier.is_empty());
    }

    #[test]
    fn test_hold_past_click_window_is_not_click() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        classifier.press(ID, 0, Point::ORIGIN, &config(), &mut timers);
        let fired = timers.pop_due(600).unwrap();
        assert!(classifier.timer_fired(fired));

        let events = classifier.release(ID, 0, Point::ORIGIN, &config(), &mut timers);
        assert!(events.is_empty());
        assert!(classifier.is_empty());
    }

    #[test]
    fn test_click_train_reports_every_followup_as_double_click() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();
        let p = Point::new(5.0, 5.0);

        let first = click_at(&mut classifier, &mut timers, p, p);
        let second = click_at(&mut classifier, &mut timers, p, p);
        let third = click_at(&mut classifier, &mut timers, p, p);

        assert_eq!(first.len(), 1);
        assert!(matches!(second.as_slice(), [EngineEvent::Click(a), EngineEvent::DoubleClick(b)] if a.count == 2 && b.count == 2));
        assert!(matches!(third.as_slice(), [EngineEvent::Click(a), EngineEvent::DoubleClick(b)] if a.count == 3 && b.count == 3));
    }

    #[test]
    fn test_double_click_window_expiry_resets_count() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();
        let p = Point::new(5.0, 5.0);

        click_at(&mut classifier, &mut timers, p, p);
        while let Some(fired) = timers.pop_due(1_000) {
            classifier.timer_fired(fired);
        }
        assert!(classifier.is_empty());

        let events = click_at(&mut classifier, &mut timers, p, p);
        assert!(matches!(events.as_slice(), [EngineEvent::Click(c)] if c.count == 1));
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        classifier.press(ID, 0, Point::ORIGIN, &config(), &mut timers);
        let stale = FiredTimer {
            handle: TimerHandle(999),
            token: TimerToken { contact: ID, button: 0, kind: TimerKind::Click },
        };

        assert!(!classifier.timer_fired(stale));
        assert_eq!(classifier.button(ID, 0).map(|s| s.pressed), Some(true));
    }

    #[test]
    fn test_repeated_press_replaces_click_window() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        classifier.press(ID, 0, Point::ORIGIN, &config(), &mut timers);
        classifier.press(ID, 0, Point::ORIGIN, &config(), &mut timers);

        assert_eq!(timers.pending_count(), 1);
    }

    #[test]
    fn test_buttons_are_independent() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();

        classifier.press(ID, 0, Point::ORIGIN, &config(), &mut timers);
        classifier.press(ID, 2, Point::ORIGIN, &config(), &mut timers);
        let events = classifier.release(ID, 2, Point::ORIGIN, &config(), &mut timers);

        assert!(matches!(events.as_slice(), [EngineEvent::Click(c)] if c.button == 2));
        assert_eq!(classifier.button(ID, 0).map(|s| s.pressed), Some(true));
    }

    #[test]
    fn test_end_contact_aborts_press_but_keeps_double_click_window() {
        let mut classifier = ClickClassifier::new();
        let mut timers = ManualTimers::new();
        let p = Point::new(1.0, 1.0);

        click_at(&mut classifier, &mut timers, p, p);
        classifier.press(ID, 1, p, &config(), &mut timers);
        classifier.end_contact(ID, &mut timers);

        assert!(classifier.button(ID, 1).is_none());
        assert_eq!(classifier.button(ID, 0).map(|s| s.click_count), Some(1));

        let events = click_at(&mut classifier, &mut timers, p, p);
        assert!(matches!(events.as_slice(), [EngineEvent::Click(_), EngineEvent::DoubleClick(_)]));
    }
}
