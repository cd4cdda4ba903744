//! Tests for the Engine module

use super::*;
use crate::timer::ManualTimers;

fn make_engine(max_contacts: usize) -> Engine<ManualTimers> {
    let mut config = EngineConfig::default();
    config.set_max_concurrent_contacts(max_contacts);
    Engine::new(config, CoordinateSpace::default(), ManualTimers::new())
}

/// Fire every timer due by `now_ms`
fn advance(engine: &mut Engine<ManualTimers>, now_ms: u64) {
    while let Some(fired) = engine.timers_mut().pop_due(now_ms) {
        engine.timer_fired(fired);
    }
}

fn clicks(events: &[EngineEvent]) -> Vec<(&'static str, u32)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Click(c) => Some(("click", c.count)),
            EngineEvent::DoubleClick(c) => Some(("dblclick", c.count)),
            _ => None,
        })
        .collect()
}

const ID: ContactId = ContactId(1);

#[test]
fn test_contact_lifecycle_events() {
    let mut engine = make_engine(1);

    let events = engine.handle(Sample::ContactStart { id: ID, x: 0.0, y: 0.0, timestamp: 0 });
    assert_eq!(
        events,
        vec![
            EngineEvent::CaptureRequested { id: ID },
            EngineEvent::AnalogUpdated { id: ID, analog: Analog::CENTERED },
        ]
    );

    let events = engine.handle(Sample::ContactEnd { id: ID });
    assert_eq!(events, vec![EngineEvent::CaptureReleased { id: ID }]);
    assert!(engine.contact(ID).is_none());
}

#[test]
fn test_follow_scenario() {
    let mut engine = make_engine(1);
    engine.handle(Sample::ContactStart { id: ID, x: 0.0, y: 0.0, timestamp: 0 });

    let events = engine.handle(Sample::ContactMove {
        id: ID,
        x: 100.0,
        y: 0.0,
        movement_x: 100.0,
        movement_y: 0.0,
        timestamp: 16,
    });

    let contact = engine.contact(ID).unwrap();
    assert!((contact.control_center().x - 28.0).abs() < 1e-9);
    assert_eq!(contact.control_center().y, 0.0);

    let deadzone = contact.deadzone_center();
    assert!(deadzone.distance(contact.control_center()) <= 64.0 + 1e-9);
    assert!(deadzone.distance(Point::new(100.0, 0.0)) <= 8.0 + 1e-9);

    let expected = follow::round2((deadzone.x - 28.0) / 64.0);
    assert_eq!(events, vec![EngineEvent::AnalogUpdated { id: ID, analog: Analog { x: expected, y: 0.0 } }]);
    assert_eq!(engine.analog(ID), Some(Analog { x: expected, y: 0.0 }));
}

#[test]
fn test_capacity_rejection_passes_through() {
    let mut engine = make_engine(1);
    engine.handle(Sample::ContactStart { id: ContactId(1), x: 0.0, y: 0.0, timestamp: 0 });

    let events = engine.handle(Sample::ContactStart { id: ContactId(2), x: 0.0, y: 0.0, timestamp: 0 });
    assert_eq!(
        events,
        vec![
            EngineEvent::CaptureRequested { id: ContactId(2) },
            EngineEvent::ContactRejected { id: ContactId(2), reason: Rejection::CapacityExceeded { max: 1 } },
        ]
    );

    // Moves of the rejected contact are ignored, clicks still work
    let moved = engine.handle(Sample::ContactMove {
        id: ContactId(2),
        x: 50.0,
        y: 0.0,
        movement_x: 50.0,
        movement_y: 0.0,
        timestamp: 5,
    });
    assert!(moved.is_empty());

    engine.handle(Sample::ButtonDown { id: ContactId(2), button: 0, x: 1.0, y: 1.0, timestamp: 10 });
    let events = engine.handle(Sample::ButtonUp { id: ContactId(2), button: 0, x: 1.0, y: 1.0, timestamp: 20 });
    assert_eq!(clicks(&events), vec![("click", 1)]);
}

#[test]
fn test_zero_capacity_disables_analog_tracking() {
    let mut engine = make_engine(0);
    let events = engine.handle(Sample::ContactStart { id: ID, x: 0.0, y: 0.0, timestamp: 0 });

    assert!(matches!(events[1], EngineEvent::ContactRejected { .. }));
    assert!(engine.tracked_ids().is_empty());
}

#[test]
fn test_end_twice_is_noop() {
    let mut engine = make_engine(2);
    engine.handle(Sample::ContactStart { id: ContactId(1), x: 0.0, y: 0.0, timestamp: 0 });
    engine.handle(Sample::ContactStart { id: ContactId(2), x: 0.0, y: 0.0, timestamp: 0 });

    engine.handle(Sample::ContactEnd { id: ContactId(1) });
    let after_once = engine.tracked_ids();
    engine.handle(Sample::ContactEnd { id: ContactId(1) });

    assert_eq!(engine.tracked_ids(), after_once);
    assert_eq!(after_once, vec![ContactId(2)]);
}

#[test]
fn test_eviction_keeps_earliest_contact() {
    let mut engine = make_engine(3);
    let (a, b, c) = (ContactId(7), ContactId(3), ContactId(5));
    for id in [a, b, c] {
        engine.handle(Sample::ContactStart { id, x: 0.0, y: 0.0, timestamp: 0 });
    }

    engine.set_attribute("analogmax", "1").unwrap();

    assert_eq!(engine.tracked_ids(), vec![a]);
    assert_eq!(engine.config().max_concurrent_contacts(), 1);
}

#[test]
fn test_apply_config_evicts_and_updates_radii() {
    let mut engine = make_engine(2);
    engine.handle(Sample::ContactStart { id: ContactId(1), x: 0.0, y: 0.0, timestamp: 0 });
    engine.handle(Sample::ContactStart { id: ContactId(2), x: 0.0, y: 0.0, timestamp: 0 });

    let mut config = EngineConfig::default();
    config.set_max_concurrent_contacts(1);
    config.set_control_radius(10.0);
    config.set_deadzone_radius(1.0);
    engine.apply_config(config);

    assert_eq!(engine.tracked_ids(), vec![ContactId(1)]);

    engine.handle(Sample::ContactMove { id: ContactId(1), x: 20.0, y: 0.0, movement_x: 0.0, movement_y: 0.0, timestamp: 1 });
    // control: 20 - 11 = 9, deadzone: 19 -> offset 10 of 10
    assert_eq!(engine.analog(ContactId(1)), Some(Analog { x: 1.0, y: 0.0 }));
}

#[test]
fn test_click_scenario() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 10.0, y: 10.0, timestamp: 0 });
    advance(&mut engine, 50);
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 12.0, y: 11.0, timestamp: 50 });

    assert_eq!(clicks(&events), vec![("click", 1)]);
}

#[test]
fn test_double_click_scenario() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 10.0, y: 10.0, timestamp: 0 });
    advance(&mut engine, 50);
    let first = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 12.0, y: 11.0, timestamp: 50 });

    advance(&mut engine, 100);
    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 10.0, y: 10.0, timestamp: 100 });
    advance(&mut engine, 150);
    let second = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 12.0, y: 11.0, timestamp: 150 });

    assert_eq!(clicks(&first), vec![("click", 1)]);
    assert_eq!(clicks(&second), vec![("click", 2), ("dblclick", 2)]);
}

#[test]
fn test_clicks_outside_double_click_window_stay_single() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 0 });
    engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 10 });

    advance(&mut engine, 2_000);
    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 2_000 });
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 2_010 });

    assert_eq!(clicks(&events), vec![("click", 1)]);
}

#[test]
fn test_sample_timestamps_do_not_affect_classification() {
    let mut engine = make_engine(1);

    // Timestamps claim a ten second hold; the timer service says 50ms
    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 0 });
    advance(&mut engine, 50);
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 10_000 });

    assert_eq!(clicks(&events), vec![("click", 1)]);
}

#[test]
fn test_drag_scenario() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 0 });
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 50.0, y: 50.0, timestamp: 40 });

    assert!(clicks(&events).is_empty());
}

#[test]
fn test_hold_scenario() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 0 });
    advance(&mut engine, 800);
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 800 });

    assert!(clicks(&events).is_empty());
    assert!(engine.clicks().is_empty());
}

#[test]
fn test_out_of_range_button_ignored() {
    let mut engine = make_engine(1);

    engine.handle(Sample::ButtonDown { id: ID, button: 7, x: 0.0, y: 0.0, timestamp: 0 });
    let events = engine.handle(Sample::ButtonUp { id: ID, button: 7, x: 0.0, y: 0.0, timestamp: 10 });

    assert!(events.is_empty());
    assert_eq!(engine.timers().pending_count(), 0);
}

#[test]
fn test_viewport_space_subtracts_origin() {
    let mut config = EngineConfig::default();
    config.set_max_concurrent_contacts(1);
    let space = CoordinateSpace::Viewport { left: 100.0, top: 200.0 };
    let mut engine = Engine::new(config, space, ManualTimers::new());

    engine.handle(Sample::ContactStart { id: ID, x: 110.0, y: 210.0, timestamp: 0 });

    assert_eq!(engine.contact(ID).map(|c| c.position), Some(Point::new(10.0, 10.0)));
}

#[test]
fn test_local_space_clamps_control_center() {
    let mut config = EngineConfig::default();
    config.set_max_concurrent_contacts(1);
    let space = CoordinateSpace::Local { width: 200.0, height: 100.0 };
    let mut engine = Engine::new(config, space, ManualTimers::new());

    engine.handle(Sample::ContactStart { id: ID, x: 100.0, y: 50.0, timestamp: 0 });
    engine.handle(Sample::ContactMove { id: ID, x: 100.0, y: 900.0, movement_x: 0.0, movement_y: 850.0, timestamp: 1 });

    let contact = engine.contact(ID).unwrap();
    assert_eq!(contact.control_center().y, 100.0);
    assert_eq!(engine.analog(ID), Some(Analog { x: 0.0, y: 1.0 }));
}

#[test]
fn test_negative_surface_size_is_sanitized() {
    let mut config = EngineConfig::default();
    config.set_max_concurrent_contacts(1);
    let space = CoordinateSpace::Local { width: -1.0, height: 100.0 };
    let mut engine = Engine::new(config, space, ManualTimers::new());

    assert_eq!(engine.coordinate_space(), CoordinateSpace::Local { width: 0.0, height: 100.0 });

    engine.handle(Sample::ContactStart { id: ID, x: 0.0, y: 50.0, timestamp: 0 });
    let events = engine.handle(Sample::ContactMove { id: ID, x: 30.0, y: 50.0, movement_x: 30.0, movement_y: 0.0, timestamp: 1 });

    assert_eq!(events.len(), 1);
    assert_eq!(engine.contact(ID).map(|c| c.control_center().x), Some(0.0));

    engine.set_coordinate_space(CoordinateSpace::Local { width: f64::NAN, height: 100.0 });
    assert_eq!(engine.coordinate_space(), CoordinateSpace::Local { width: 0.0, height: 100.0 });
    engine.handle(Sample::ContactMove { id: ID, x: 300.0, y: 50.0, movement_x: 270.0, movement_y: 0.0, timestamp: 2 });
    assert!(engine.analog(ID).is_some());
}

#[test]
fn test_reset_cancels_all_timers() {
    let mut engine = make_engine(2);
    engine.handle(Sample::ContactStart { id: ID, x: 0.0, y: 0.0, timestamp: 0 });
    engine.handle(Sample::ButtonDown { id: ID, button: 0, x: 0.0, y: 0.0, timestamp: 0 });

    engine.reset();

    assert!(engine.tracked_ids().is_empty());
    assert!(engine.clicks().is_empty());
    assert_eq!(engine.timers().pending_count(), 0);
    assert_eq!(engine.config().max_concurrent_contacts(), 2);
}
