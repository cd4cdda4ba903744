//! Contact tracker: one analog state record per admitted contact
//!
//! Records are kept in admission order so that shrinking the capacity keeps
//! the earliest contacts and evicts the latest ones.

use tracing::debug;

use super::follow::{AnalogState, Bounds, Radii};
use super::types::{Analog, ContactId, Point, Rejection};

/// Analog tracking state of one contact
#[derive(Debug, Clone, PartialEq)]
pub struct ContactState {
    pub id: ContactId,
    /// Last raw position, surface-local
    pub position: Point,
    /// Last reported movement delta (advisory)
    pub movement: (f64, f64),
    pub analog: AnalogState,
}

impl ContactState {
    fn new(id: ContactId, position: Point) -> Self {
        Self {
            id,
            position,
            movement: (0.0, 0.0),
            analog: AnalogState::at(position),
        }
    }

    /// Center of the control circle (the joystick base)
    pub fn control_center(&self) -> Point {
        self.analog.control
    }

    /// Center of the deadzone circle (the stick tip)
    pub fn deadzone_center(&self) -> Point {
        self.analog.deadzone
    }
}

/// Capacity-bounded set of tracked contacts, in admission order
#[derive(Debug, Default)]
pub struct ContactTracker {
    contacts: Vec<ContactState>,
    capacity: usize,
}

impl ContactTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            contacts: Vec::with_capacity(capacity.min(16)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, id: ContactId) -> Option<&ContactState> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Tracked ids, earliest admission first
    pub fn ids(&self) -> impl Iterator<Item = ContactId> + '_ {
        self.contacts.iter().map(|c| c.id)
    }

    /// Admit a contact if capacity allows.
    ///
    /// A start for an id that is already tracked re-initializes it in place.
    pub fn start(&mut self, id: ContactId, position: Point) -> Result<(), Rejection> {
        if let Some(existing) = self.contacts.iter_mut().find(|c| c.id == id) {
            debug!("Contact {} restarted at ({}, {})", id, position.x, position.y);
            *existing = ContactState::new(id, position);
            return Ok(());
        }

        if self.contacts.len() >= self.capacity {
            debug!("Contact {} not tracked: {} of {} slots in use", id, self.contacts.len(), self.capacity);
            return Err(Rejection::CapacityExceeded { max: self.capacity });
        }

        self.contacts.push(ContactState::new(id, position));
        debug!("Contact {} tracked ({}/{})", id, self.contacts.len(), self.capacity);
        Ok(())
    }

    /// Run the follow solver for a tracked contact.
    ///
    /// Returns `None` for unknown ids (rejected or already ended contacts).
    pub fn update(
        &mut self,
        id: ContactId,
        position: Point,
        movement: (f64, f64),
        radii: Radii,
        bounds: Option<Bounds>,
    ) -> Option<Analog> {
        let contact = self.contacts.iter_mut().find(|c| c.id == id)?;

        contact.position = position;
        contact.movement = movement;
        Some(contact.analog.follow(position, radii, bounds))
    }

    /// Stop tracking a contact. Unknown ids are a no-op.
    pub fn end(&mut self, id: ContactId) -> Option<ContactState> {
        let index = self.contacts.iter().position(|c| c.id == id)?;
        Some(self.contacts.remove(index))
    }

    /// Change the capacity, evicting the most recently admitted contacts first.
    ///
    /// Returns the evicted ids.
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<ContactId> {
        self.capacity = capacity;

        if self.contacts.len() <= capacity {
            return Vec::new();
        }

        let evicted: Vec<ContactId> = self.contacts.drain(capacity..).map(|c| c.id).collect();
        debug!("Capacity reduced to {}, evicted contacts {:?}", capacity, evicted);
        evicted
    }
}
