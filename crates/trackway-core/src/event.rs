//! Track events attached to finalized elements.
//!
//! Every event sits at a `delta` relative to the start of its element. A
//! follower crossing that point calls [`Event::trigger`] with the crossing
//! direction, and the event updates a [`TriggerContext`]. Crossing backwards
//! undoes what the forward crossing did, so a follower that reverses over an
//! event restores the state it had before.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block::{Fog, HornKind, LightingChange, PowerSupply, PowerSupplyKind};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// What kind of follower crossed an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    /// Never fires events.
    #[default]
    None,
    Camera,
    TrainFront,
    TrainRear,
    Car,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    BackgroundChange {
        previous: usize,
        next: usize,
    },
    BrightnessChange {
        value: f64,
        previous: f64,
        /// Distance from the previous brightness change.
        previous_distance: f64,
        next: f64,
        /// Distance to the next brightness change.
        next_distance: f64,
    },
    FogChange {
        previous: Fog,
        current: Fog,
        next: Fog,
    },
    /// Points clatter where a rail crosses the running rail.
    PointSound,
    StationStart {
        station: usize,
    },
    StationEnd {
        station: usize,
    },
    StationPassAlarm,
    /// Speed limits in m/s, infinite when unlimited.
    LimitChange {
        previous: f64,
        next: f64,
    },
    MarkerStart {
        marker: usize,
    },
    MarkerEnd {
        marker: usize,
    },
    TrainSound {
        file: String,
        /// Reference speed in m/s, 0 for a fixed pitch.
        speed: f64,
        all_cars: bool,
        rail: usize,
    },
    Lighting(LightingChange),
    HornBlow {
        kind: HornKind,
        trigger_once: bool,
    },
    PowerSupplyChange {
        previous: BTreeMap<PowerSupplyKind, PowerSupply>,
        next: BTreeMap<PowerSupplyKind, PowerSupply>,
    },
    SectionChange {
        /// `-1` before the first section.
        previous: i32,
        next: i32,
    },
    Transponder {
        kind: i32,
        data: i32,
        /// Bound section, `-1` when unbound.
        section: i32,
        clip_to_first_red_section: bool,
    },
    Buffer {
        rail: usize,
    },
    Switch {
        rail: usize,
        second_rail: usize,
    },
    Destination {
        kind: i32,
        next: i32,
        previous: i32,
        trigger_once: bool,
    },
    TrackEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Offset from the owning element's start position.
    pub delta: f64,
    pub kind: EventKind,
}

impl Event {
    pub fn new(delta: f64, kind: EventKind) -> Self {
        Self { delta, kind }
    }
}

// ---------------------------------------------------------------------------
// Trigger context
// ---------------------------------------------------------------------------

/// One recorded crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct FiredEvent {
    pub element: usize,
    pub delta: f64,
    pub kind: EventKind,
    /// `1` forwards, `-1` backwards.
    pub direction: i32,
    pub trigger: TriggerType,
}

/// State driven by events, plus the log of every crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerContext {
    pub station: Option<usize>,
    pub section: i32,
    pub speed_limit: f64,
    pub brightness: f64,
    pub fog: Option<Fog>,
    pub background: Option<usize>,
    pub destination: i32,
    pub fired: Vec<FiredEvent>,
}

impl Default for TriggerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerContext {
    pub fn new() -> Self {
        Self {
            station: None,
            section: -1,
            speed_limit: f64::INFINITY,
            brightness: 1.0,
            fog: None,
            background: None,
            destination: -1,
            fired: Vec::new(),
        }
    }

    /// Takes the fired log, leaving it empty.
    pub fn drain_fired(&mut self) -> Vec<FiredEvent> {
        std::mem::take(&mut self.fired)
    }
}

// ---------------------------------------------------------------------------
// Triggering
// ---------------------------------------------------------------------------

impl Event {
    /// Applies this event for a crossing in `direction`. A `None` trigger is
    /// ignored.
    pub fn trigger(
        &self,
        direction: i32,
        trigger: TriggerType,
        element: usize,
        ctx: &mut TriggerContext,
    ) {
        if trigger == TriggerType::None {
            return;
        }
        let forward = direction > 0;
        match &self.kind {
            EventKind::BackgroundChange { previous, next } => {
                ctx.background = Some(if forward { *next } else { *previous });
            }
            EventKind::BrightnessChange {
                value, previous, ..
            } => {
                ctx.brightness = if forward { *value } else { *previous };
            }
            EventKind::FogChange { current, next, .. } => {
                ctx.fog = Some(if forward { *next } else { *current });
            }
            EventKind::StationStart { station } => {
                ctx.station = if forward { Some(*station) } else { None };
            }
            EventKind::StationEnd { station } => {
                ctx.station = if forward { None } else { Some(*station) };
            }
            EventKind::LimitChange { previous, next } => {
                ctx.speed_limit = if forward { *next } else { *previous };
            }
            EventKind::SectionChange { previous, next } => {
                ctx.section = if forward { *next } else { *previous };
            }
            EventKind::Destination { next, previous, .. } => {
                ctx.destination = if forward { *next } else { *previous };
            }
            _ => {}
        }
        ctx.fired.push(FiredEvent {
            element,
            delta: self.delta,
            kind: self.kind.clone(),
            direction,
            trigger,
        });
    }
}

/// Fires the events of one element crossed between `old_delta` and
/// `new_delta`. Backwards, events fire in reverse order when
/// `old > delta >= new`; forwards, in order when `old < delta <= new`.
pub fn check_events(
    events: &[Event],
    element: usize,
    direction: i32,
    old_delta: f64,
    new_delta: f64,
    trigger: TriggerType,
    ctx: &mut TriggerContext,
) {
    if trigger == TriggerType::None || events.is_empty() {
        return;
    }
    if direction < 0 {
        for e in events.iter().rev() {
            if old_delta > e.delta && new_delta <= e.delta {
                e.trigger(-1, trigger, element, ctx);
            }
        }
    } else if direction > 0 {
        for e in events {
            if old_delta < e.delta && new_delta >= e.delta {
                e.trigger(1, trigger, element, ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<Event> {
        vec![
            Event::new(5.0, EventKind::StationStart { station: 2 }),
            Event::new(
                10.0,
                EventKind::LimitChange {
                    previous: f64::INFINITY,
                    next: 20.0,
                },
            ),
            Event::new(15.0, EventKind::SectionChange { previous: 0, next: 1 }),
        ]
    }

    #[test]
    fn forward_crossing_fires_in_order() {
        let mut ctx = TriggerContext::new();
        check_events(&events(), 0, 1, 0.0, 15.0, TriggerType::TrainFront, &mut ctx);
        let deltas: Vec<f64> = ctx.fired.iter().map(|f| f.delta).collect();
        assert_eq!(deltas, vec![5.0, 10.0, 15.0]);
        assert_eq!(ctx.station, Some(2));
        assert_eq!(ctx.speed_limit, 20.0);
        assert_eq!(ctx.section, 1);
    }

    #[test]
    fn backward_crossing_reverts_state() {
        let mut ctx = TriggerContext::new();
        let ev = events();
        check_events(&ev, 0, 1, 0.0, 20.0, TriggerType::Camera, &mut ctx);
        ctx.drain_fired();
        check_events(&ev, 0, -1, 20.0, 7.0, TriggerType::Camera, &mut ctx);
        let deltas: Vec<f64> = ctx.fired.iter().map(|f| f.delta).collect();
        assert_eq!(deltas, vec![15.0, 10.0]);
        assert!(ctx.fired.iter().all(|f| f.direction == -1));
        assert_eq!(ctx.section, 0);
        assert_eq!(ctx.speed_limit, f64::INFINITY);
        assert_eq!(ctx.station, Some(2));
    }

    #[test]
    fn boundaries_are_half_open() {
        let mut ctx = TriggerContext::new();
        let ev = events();
        check_events(&ev, 0, 1, 5.0, 10.0, TriggerType::Car, &mut ctx);
        assert_eq!(ctx.fired.len(), 1);
        assert_eq!(ctx.fired[0].delta, 10.0);
    }

    #[test]
    fn none_trigger_never_fires() {
        let mut ctx = TriggerContext::new();
        check_events(&events(), 0, 1, 0.0, 20.0, TriggerType::None, &mut ctx);
        assert!(ctx.fired.is_empty());
        assert_eq!(ctx.station, None);
    }

    #[test]
    fn station_end_reenters_backwards() {
        let mut ctx = TriggerContext::new();
        let e = Event::new(1.0, EventKind::StationEnd { station: 4 });
        e.trigger(-1, TriggerType::TrainFront, 3, &mut ctx);
        assert_eq!(ctx.station, Some(4));
        e.trigger(1, TriggerType::TrainFront, 3, &mut ctx);
        assert_eq!(ctx.station, None);
    }
}
