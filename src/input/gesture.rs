//! Multi-touch gesture recognition
//!
//! [`GestureTranslator`] follows raw pointer events by pointer id and turns
//! them into incremental camera gestures: one finger orbits, two fingers
//! pan and pinch. Deltas are consumed as they are emitted, so a consumer
//! applying every `Orbit` sees the finger's full displacement exactly once.

use std::time::{Duration, Instant};

use cgmath::{EuclideanSpace, MetricSpace, Point2};
use log::debug;

use crate::gfx::camera::ScreenPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Started,
    Moved,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub id: u64,
    pub phase: PointerPhase,
    pub position: ScreenPoint,
    pub time: Instant,
}

impl PointerEvent {
    pub fn new(id: u64, phase: PointerPhase, position: ScreenPoint, time: Instant) -> Self {
        Self {
            id,
            phase,
            position,
            time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizerState {
    Possible,
    Began,
    Changed,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraGesture {
    /// First finger touched down
    InteractionStarted,
    /// Single finger drag from `anchor` to `current`
    Orbit {
        anchor: ScreenPoint,
        current: ScreenPoint,
    },
    /// Two finger drag; `start` is the previous midpoint
    Pan {
        start: ScreenPoint,
        midpoint: ScreenPoint,
    },
    /// Pinch; `scale` is relative to the previous finger spread
    Zoom { scale: f64, center: ScreenPoint },
    DoubleTap { location: ScreenPoint },
    /// Last finger lifted or the gesture was cancelled
    InteractionEnded,
}

#[derive(Debug, Clone, Copy)]
pub struct GestureConfig {
    pub max_touches: usize,
    pub double_tap_interval: Duration,
    /// How far a finger may wander and still count as a tap, in pixels
    pub double_tap_slop: f64,
    /// Finger spreads below this are too small to derive a pinch scale from
    pub min_pinch_span: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            max_touches: 2,
            double_tap_interval: Duration::from_millis(300),
            double_tap_slop: 24.0,
            min_pinch_span: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    position: ScreenPoint,
    time: Instant,
}

pub struct GestureTranslator {
    config: GestureConfig,
    enabled: bool,
    state: RecognizerState,
    touches: Vec<(u64, ScreenPoint)>,
    anchor: ScreenPoint,
    current: ScreenPoint,
    start: ScreenPoint,
    midpoint: ScreenPoint,
    pinch_span: f64,
    tap_candidate: Option<Tap>,
    last_tap: Option<Tap>,
}

impl GestureTranslator {
    /// Creates a disabled translator
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            enabled: false,
            state: RecognizerState::Possible,
            touches: Vec::with_capacity(config.max_touches),
            anchor: Point2::origin(),
            current: Point2::origin(),
            start: Point2::origin(),
            midpoint: Point2::origin(),
            pinch_span: 0.0,
            tap_candidate: None,
            last_tap: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables recognition. Disabling during a gesture cancels
    /// it, and the returned `InteractionEnded` must be delivered like any
    /// other gesture.
    pub fn set_enabled(&mut self, enabled: bool) -> Vec<CameraGesture> {
        self.enabled = enabled;
        if !enabled && !self.touches.is_empty() {
            return self.cancel();
        }
        Vec::new()
    }

    pub fn state(&self) -> RecognizerState {
        self.state
    }

    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    pub fn has_single_touch(&self) -> bool {
        self.touches.len() == 1
    }

    pub fn has_two_touches(&self) -> bool {
        self.touches.len() == 2
    }

    pub fn anchor_location(&self) -> ScreenPoint {
        self.anchor
    }

    pub fn current_location(&self) -> ScreenPoint {
        self.current
    }

    pub fn start_location(&self) -> ScreenPoint {
        self.start
    }

    /// Midpoint of the active touches; the finger itself with one touch
    pub fn midpoint_location(&self) -> ScreenPoint {
        self.midpoint
    }

    pub fn handle(&mut self, event: PointerEvent) -> Vec<CameraGesture> {
        if !self.enabled {
            return Vec::new();
        }
        match event.phase {
            PointerPhase::Started => self.touch_down(event),
            PointerPhase::Moved => self.touch_moved(event),
            PointerPhase::Ended => self.touch_up(event),
            PointerPhase::Cancelled => {
                if self.is_tracked(event.id) {
                    self.cancel()
                } else {
                    Vec::new()
                }
            }
        }
    }

    fn is_tracked(&self, id: u64) -> bool {
        self.touches.iter().any(|(tracked, _)| *tracked == id)
    }

    fn touch_down(&mut self, event: PointerEvent) -> Vec<CameraGesture> {
        if self.is_tracked(event.id) || self.touches.len() >= self.config.max_touches {
            return Vec::new();
        }
        self.touches.push((event.id, event.position));

        match self.touches.len() {
            1 => {
                self.state = RecognizerState::Began;
                self.anchor = event.position;
                self.current = event.position;
                self.start = event.position;
                self.midpoint = event.position;
                self.tap_candidate = Some(Tap {
                    position: event.position,
                    time: event.time,
                });
                vec![CameraGesture::InteractionStarted]
            }
            _ => {
                let (a, b) = self.first_two();
                self.midpoint = a.midpoint(b);
                self.start = self.midpoint;
                self.pinch_span = a.distance(b);
                self.tap_candidate = None;
                self.last_tap = None;
                Vec::new()
            }
        }
    }

    fn touch_moved(&mut self, event: PointerEvent) -> Vec<CameraGesture> {
        let Some(slot) = self.touches.iter_mut().find(|(id, _)| *id == event.id) else {
            return Vec::new();
        };
        slot.1 = event.position;
        self.state = RecognizerState::Changed;

        let mut gestures = Vec::new();
        if self.touches.len() == 1 {
            if let Some(tap) = self.tap_candidate {
                if tap.position.distance(event.position) > self.config.double_tap_slop {
                    self.tap_candidate = None;
                }
            }

            self.current = event.position;
            self.midpoint = event.position;
            if self.current != self.anchor {
                gestures.push(CameraGesture::Orbit {
                    anchor: self.anchor,
                    current: self.current,
                });
                self.anchor = self.current;
            }
        } else {
            let (a, b) = self.first_two();
            let midpoint = a.midpoint(b);
            let span = a.distance(b);

            if midpoint != self.start {
                gestures.push(CameraGesture::Pan {
                    start: self.start,
                    midpoint,
                });
                self.start = midpoint;
            }
            self.midpoint = midpoint;

            if self.pinch_span >= self.config.min_pinch_span && span != self.pinch_span {
                gestures.push(CameraGesture::Zoom {
                    scale: span / self.pinch_span,
                    center: midpoint,
                });
            }
            self.pinch_span = span;
        }
        gestures
    }

    fn touch_up(&mut self, event: PointerEvent) -> Vec<CameraGesture> {
        let Some(index) = self.touches.iter().position(|(id, _)| *id == event.id) else {
            return Vec::new();
        };
        self.touches.remove(index);

        if let Some(&(_, remaining)) = self.touches.first() {
            // The finger left behind takes over without a jump.
            self.anchor = remaining;
            self.current = remaining;
            self.start = remaining;
            self.midpoint = remaining;
            return Vec::new();
        }

        self.state = RecognizerState::Ended;
        let mut gestures = Vec::new();
        match self.tap_candidate.take() {
            Some(tap) if event.position.distance(tap.position) <= self.config.double_tap_slop => {
                gestures.extend(self.register_tap(tap));
            }
            // Anything that was not a tap breaks up a pending pair.
            _ => self.last_tap = None,
        }
        gestures.push(CameraGesture::InteractionEnded);
        gestures
    }

    fn register_tap(&mut self, tap: Tap) -> Option<CameraGesture> {
        match self.last_tap.take() {
            Some(previous)
                if tap.time.saturating_duration_since(previous.time)
                    <= self.config.double_tap_interval
                    && tap.position.distance(previous.position) <= self.config.double_tap_slop =>
            {
                debug!("Double tap at ({:.1}, {:.1})", tap.position.x, tap.position.y);
                Some(CameraGesture::DoubleTap {
                    location: tap.position,
                })
            }
            _ => {
                self.last_tap = Some(tap);
                None
            }
        }
    }

    fn cancel(&mut self) -> Vec<CameraGesture> {
        self.touches.clear();
        self.state = RecognizerState::Cancelled;
        self.tap_candidate = None;
        self.last_tap = None;
        vec![CameraGesture::InteractionEnded]
    }

    fn first_two(&self) -> (ScreenPoint, ScreenPoint) {
        (self.touches[0].1, self.touches[1].1)
    }
}

impl Default for GestureTranslator {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
