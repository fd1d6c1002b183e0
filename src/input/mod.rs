// src/input/mod.rs
//! Pointer input
//!
//! Converts winit touch and mouse events into [`PointerEvent`]s and from
//! there into camera gestures.

pub mod gesture;

pub use gesture::{
    CameraGesture, GestureConfig, GestureTranslator, PointerEvent, PointerPhase, RecognizerState,
};

use std::time::Instant;

use cgmath::Point2;
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, Touch, TouchPhase},
};

/// Pointer id used when a mouse button emulates a finger. Touch ids from
/// winit are small integers, so this never collides.
pub const MOUSE_POINTER_ID: u64 = u64::MAX;

pub fn pointer_phase(phase: TouchPhase) -> PointerPhase {
    match phase {
        TouchPhase::Started => PointerPhase::Started,
        TouchPhase::Moved => PointerPhase::Moved,
        TouchPhase::Ended => PointerPhase::Ended,
        TouchPhase::Cancelled => PointerPhase::Cancelled,
    }
}

pub fn pointer_event_from_touch(touch: &Touch, time: Instant) -> PointerEvent {
    PointerEvent::new(
        touch.id,
        pointer_phase(touch.phase),
        Point2::new(touch.location.x, touch.location.y),
        time,
    )
}

/// Finger-down or finger-up for a mouse button at the last cursor position
pub fn pointer_event_from_button(
    state: ElementState,
    cursor: PhysicalPosition<f64>,
    time: Instant,
) -> PointerEvent {
    let phase = match state {
        ElementState::Pressed => PointerPhase::Started,
        ElementState::Released => PointerPhase::Ended,
    };
    PointerEvent::new(MOUSE_POINTER_ID, phase, Point2::new(cursor.x, cursor.y), time)
}

pub fn pointer_event_from_cursor(cursor: PhysicalPosition<f64>, time: Instant) -> PointerEvent {
    PointerEvent::new(
        MOUSE_POINTER_ID,
        PointerPhase::Moved,
        Point2::new(cursor.x, cursor.y),
        time,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_phases_map_one_to_one() {
        assert_eq!(pointer_phase(TouchPhase::Started), PointerPhase::Started);
        assert_eq!(pointer_phase(TouchPhase::Moved), PointerPhase::Moved);
        assert_eq!(pointer_phase(TouchPhase::Ended), PointerPhase::Ended);
        assert_eq!(pointer_phase(TouchPhase::Cancelled), PointerPhase::Cancelled);
    }

    #[test]
    fn test_mouse_button_emulates_finger() {
        let now = Instant::now();
        let cursor = PhysicalPosition::new(12.0, 34.0);
        let down = pointer_event_from_button(ElementState::Pressed, cursor, now);
        let up = pointer_event_from_button(ElementState::Released, cursor, now);

        assert_eq!(down.id, MOUSE_POINTER_ID);
        assert_eq!(down.phase, PointerPhase::Started);
        assert_eq!(up.phase, PointerPhase::Ended);
        assert_eq!(down.position, Point2::new(12.0, 34.0));
    }
}
