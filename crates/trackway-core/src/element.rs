//! Compiled route output: the immutable element array and the route-wide
//! tables the builder derives from the block store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::block::{
    BufferStop, Marker, PointOfInterest, PowerSupply, PowerSupplyKind, PreTrainInstruction,
    SectionKind, SignalObject, SwitchDef,
};
use crate::diagnostics::Diagnostic;
use crate::event::Event;
use crate::math::{Vector2, Vector3};
use crate::station::Station;

/// One finalized block of track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackElement {
    pub start_position: f64,
    pub world_position: Vector3,
    pub world_direction: Vector3,
    pub world_up: Vector3,
    pub world_side: Vector3,
    /// Gradient as rise over run.
    pub pitch: f64,
    pub curve_radius: f64,
    pub curve_cant: f64,
    pub curve_cant_tangent: f64,
    /// Height of rail 0 above the ground.
    pub height: f64,
    pub adhesion: f64,
    /// Track inaccuracy level, 0 to 4.
    pub accuracy: f64,
    pub rain_intensity: i32,
    pub snow_intensity: i32,
    pub power_supplies: BTreeMap<PowerSupplyKind, PowerSupply>,
    pub events: Vec<Event>,
}

impl TrackElement {
    /// Straight, level element at `start_position` facing +Z.
    pub fn straight(start_position: f64) -> Self {
        let world_direction = Vector3::FORWARD;
        let world_side = Vector3::new(1.0, 0.0, 0.0);
        Self {
            start_position,
            world_position: Vector3::new(0.0, 0.0, start_position),
            world_direction,
            world_up: world_direction.cross(world_side),
            world_side,
            pitch: 0.0,
            curve_radius: 0.0,
            curve_cant: 0.0,
            curve_cant_tangent: 0.0,
            height: 0.0,
            adhesion: 1.0,
            accuracy: 2.0,
            rain_intensity: 0,
            snow_intensity: 0,
            power_supplies: BTreeMap::new(),
            events: Vec::new(),
        }
    }
}

/// A signalling section with its neighbours linked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub track_position: f64,
    pub aspects: Vec<i32>,
    pub kind: SectionKind,
    pub departure_station: Option<usize>,
    pub invisible: bool,
    pub previous: Option<usize>,
    pub next: Option<usize>,
}

/// A placed signal head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub track_position: f64,
    /// Absolute section index, `-1` when it points before the first section.
    pub section: i32,
    pub object: SignalObject,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub show_object: bool,
    pub show_post: bool,
}

/// A placed transponder with the section it resolved to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transponder {
    pub track_position: f64,
    pub kind: i32,
    pub data: i32,
    /// Absolute section index, `-1` when it never met its section.
    pub section: i32,
    pub clip_to_first_red_section: bool,
}

/// A switch between rail `rail` and its diverging rail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub track_position: f64,
    pub rail: usize,
    pub def: SwitchDef,
}

/// Everything one compile produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub block_interval: f64,
    pub rail_gauge: f64,
    pub elements: Vec<TrackElement>,
    pub stations: Vec<Station>,
    pub sections: Vec<Section>,
    pub signals: Vec<Signal>,
    /// Sorted by track position.
    pub transponders: Vec<Transponder>,
    pub markers: Vec<Marker>,
    pub switches: Vec<Switch>,
    pub pretrain_instructions: Vec<PreTrainInstruction>,
    pub buffer_positions: Vec<BufferStop>,
    pub points_of_interest: Vec<PointOfInterest>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Route {
    /// Total number of events across all elements.
    pub fn event_count(&self) -> usize {
        self.elements.iter().map(|e| e.events.len()).sum()
    }

    /// Element containing `position`, clamped to the first and last.
    pub fn element_index_for(&self, position: f64) -> usize {
        let n = self.elements.partition_point(|e| e.start_position <= position);
        n.saturating_sub(1)
    }
}
