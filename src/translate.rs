//! Touch-to-pointer translation
//!
//! Converts touch lists (start/move/end/cancel with changed touches) to the
//! pointer samples the engine understands. Each touch becomes one contact
//! using the primary button.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

use crate::engine::{ContactId, Point, Sample};

/// Touch list phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchPhase {
    Start,
    Move,
    End,
    Cancel,
}

/// One changed touch point
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TouchPoint {
    pub identifier: i64,
    pub x: f64,
    pub y: f64,
}

/// A touch event carrying the touches that changed
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    #[serde(default)]
    pub timestamp_ms: u64,
    pub touches: Vec<TouchPoint>,
}

/// Stateful translator remembering each touch's last position
#[derive(Debug)]
pub struct TouchTranslator {
    id_base: i64,
    last_positions: HashMap<i64, Point>,
}

impl TouchTranslator {
    /// `id_base` is added to touch identifiers to form contact ids
    pub fn new(id_base: i64) -> Self {
        Self {
            id_base,
            last_positions: HashMap::new(),
        }
    }

    /// Contact id a touch identifier maps to
    pub fn contact_id(&self, identifier: i64) -> ContactId {
        ContactId(identifier.saturating_add(self.id_base))
    }

    /// Touches currently down
    pub fn active_touches(&self) -> usize {
        self.last_positions.len()
    }

    pub fn translate(&mut self, event: &TouchEvent) -> Vec<Sample> {
        let timestamp = event.timestamp_ms;
        let mut samples = Vec::with_capacity(event.touches.len() * 2);

        for touch in &event.touches {
            let id = self.contact_id(touch.identifier);
            let (x, y) = (touch.x, touch.y);

            match event.phase {
                TouchPhase::Start => {
                    self.last_positions.insert(touch.identifier, Point::new(x, y));
                    samples.push(Sample::ContactStart { id, x, y, timestamp });
                    samples.push(Sample::ButtonDown { id, button: 0, x, y, timestamp });
                }
                TouchPhase::Move => {
                    let Some(last) = self.last_positions.get_mut(&touch.identifier) else {
                        trace!("Move for unknown touch {} ignored", touch.identifier);
                        continue;
                    };
                    let (movement_x, movement_y) = (x - last.x, y - last.y);
                    *last = Point::new(x, y);
                    samples.push(Sample::ContactMove { id, x, y, movement_x, movement_y, timestamp });
                }
                TouchPhase::End => {
                    if self.last_positions.remove(&touch.identifier).is_none() {
                        trace!("End for unknown touch {} ignored", touch.identifier);
                        continue;
                    }
                    samples.push(Sample::ButtonUp { id, button: 0, x, y, timestamp });
                    samples.push(Sample::ContactEnd { id });
                }
                TouchPhase::Cancel => {
                    // No release: a cancelled touch never counts as a click
                    if self.last_positions.remove(&touch.identifier).is_some() {
                        samples.push(Sample::ContactEnd { id });
                    }
                }
            }
        }

        samples
    }
}
