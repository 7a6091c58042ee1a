//! Block store: the mutable per-block route model.
//!
//! The interpreter writes into the block that contains the current track
//! position. When the position moves past the last block, the missing blocks
//! are created by carrying the continuing state (rails, poles, walls, track
//! state) forward and starting every one-shot collection empty.
//!
//! Per-rail data lives in [`Slots`], an index-addressed arena where a slot is
//! either occupied or empty. Referencing rail `n` grows the arena to `n + 1`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::math::{Vector2, Vector3};
use crate::station::Station;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// Index-addressed growable container with explicit slot occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slots<T> {
    items: Vec<Option<T>>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Slots<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index).and_then(Option::as_mut)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Stores `value` at `index`, growing the arena as needed. Returns the
    /// previous occupant.
    pub fn insert(&mut self, index: usize, value: T) -> Option<T> {
        self.grow(index);
        self.items[index].replace(value)
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.items.get_mut(index).and_then(Option::take)
    }

    pub fn get_or_insert_with(&mut self, index: usize, f: impl FnOnce() -> T) -> &mut T {
        self.grow(index);
        self.items[index].get_or_insert_with(f)
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> {
        self.items
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|v| (i, v)))
    }

    /// Arena length: one past the highest index ever referenced.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.iter().all(Option::is_none)
    }

    fn grow(&mut self, index: usize) {
        if self.items.len() <= index {
            self.items.resize_with(index + 1, || None);
        }
    }
}

/// Grows a per-rail vector to hold `index`, filling new entries with defaults.
pub(crate) fn grow_to<T: Default>(v: &mut Vec<T>, index: usize) {
    if v.len() <= index {
        v.resize_with(index + 1, T::default);
    }
}

// ---------------------------------------------------------------------------
// Per-rail state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerSupplyKind {
    OverheadLine,
    ThirdRail,
    FourthRail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentKind {
    Ac,
    Dc,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSupply {
    pub current: CurrentKind,
    pub voltage: f64,
    pub amps: f64,
    pub contact_height: f64,
}

impl PowerSupply {
    /// Electrical defaults for a supply kind.
    pub fn defaults(kind: PowerSupplyKind) -> Self {
        match kind {
            PowerSupplyKind::OverheadLine => Self {
                current: CurrentKind::Ac,
                voltage: 25_000.0,
                amps: 1000.0,
                contact_height: 5.3,
            },
            PowerSupplyKind::ThirdRail | PowerSupplyKind::FourthRail => Self {
                current: CurrentKind::Dc,
                voltage: 750.0,
                amps: 3000.0,
                contact_height: 0.0,
            },
        }
    }
}

/// A lateral track path within one block.
#[derive(Debug, Clone, PartialEq)]
pub struct Rail {
    pub started: bool,
    /// Set when the rail was (re)started inside the current block.
    pub start_refreshed: bool,
    pub ended: bool,
    /// Lateral `(x, y)` offset from rail 0 at the block start.
    pub start: Vector2,
    /// Lateral offset at the block end.
    pub end: Vector2,
    pub curve_cant: f64,
    pub accuracy: f64,
    pub adhesion: f64,
    pub driveable: bool,
    pub power_supplies: BTreeMap<PowerSupplyKind, PowerSupply>,
}

impl Default for Rail {
    fn default() -> Self {
        Self {
            started: false,
            start_refreshed: false,
            ended: false,
            start: Vector2::ZERO,
            end: Vector2::ZERO,
            curve_cant: 0.0,
            accuracy: 2.0,
            adhesion: 1.0,
            driveable: false,
            power_supplies: BTreeMap::new(),
        }
    }
}

impl Rail {
    /// State carried into the next block: the rail continues from where it
    /// ended, keeping its started flag and physical properties.
    fn continued(&self) -> Self {
        Self {
            started: self.started,
            start_refreshed: false,
            ended: false,
            start: self.end,
            end: self.end,
            curve_cant: 0.0,
            accuracy: self.accuracy,
            adhesion: self.adhesion,
            driveable: self.driveable,
            power_supplies: self.power_supplies.clone(),
        }
    }
}

/// Repeating structure binding for one rail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RailCycle {
    /// Catalog rail cycle in use, if any.
    pub cycle: Option<usize>,
    /// Position within the cycle.
    pub current: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pole {
    pub exists: bool,
    /// Number of additional rails the pole spans.
    pub mode: usize,
    pub location: f64,
    pub interval: f64,
    pub kind: usize,
}

impl Pole {
    pub fn new(block_interval: f64) -> Self {
        Self {
            exists: false,
            mode: 0,
            location: 0.0,
            interval: 2.0 * block_interval,
            kind: 0,
        }
    }
}

/// Side selector used by walls, dikes and station doors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Both,
    None,
}

impl Direction {
    /// Parses a side argument. For walls and dikes `0` means both sides;
    /// for doors it means neither.
    pub fn parse(s: &str, wall_or_dike: bool) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "-1" | "L" | "LEFT" => Some(Self::Left),
            "1" | "R" | "RIGHT" => Some(Self::Right),
            "B" | "BOTH" => Some(Self::Both),
            "0" if wall_or_dike => Some(Self::Both),
            "0" | "N" | "NONE" | "NEITHER" => Some(Self::None),
            _ => None,
        }
    }

    pub fn includes_left(self) -> bool {
        matches!(self, Self::Left | Self::Both)
    }

    pub fn includes_right(self) -> bool {
        matches!(self, Self::Right | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallDike {
    pub exists: bool,
    pub kind: usize,
    pub direction: Direction,
}

// ---------------------------------------------------------------------------
// One-shot records
// ---------------------------------------------------------------------------

/// Second target of a platform form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormTarget {
    Rail(usize),
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub primary: usize,
    pub secondary: FormTarget,
    pub form_kind: usize,
    pub roof_kind: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Crack {
    pub primary: usize,
    pub secondary: usize,
    pub kind: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreeObject {
    pub track_position: f64,
    pub kind: usize,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    IndexBased,
    ValueBased,
    PermissiveIndexBased,
    PermissiveValueBased,
}

impl SectionKind {
    pub fn is_value_based(self) -> bool {
        matches!(self, Self::ValueBased | Self::PermissiveValueBased)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionDef {
    pub track_position: f64,
    /// Aspect list. Invalid entries are stored as `-1`.
    pub aspects: Vec<i32>,
    pub departure_station: Option<usize>,
    pub kind: SectionKind,
    pub invisible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalObject {
    Custom(usize),
    Compatibility(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDef {
    pub track_position: f64,
    /// Absolute index of the section the signal displays.
    pub section: i32,
    pub object: SignalObject,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub show_object: bool,
    pub show_post: bool,
}

/// Transponder type codes with a fixed meaning.
pub mod transponder_kind {
    pub const ATS_SN: i32 = 0;
    pub const ATS_P_RENEWAL: i32 = 3;
    pub const ATS_P_PERMANENT_SPEED_LIMIT: i32 = 6;
    pub const ATS_P_TEMPORARY_SPEED_LIMIT: i32 = 7;
}

/// Beacon structure placeholder for transponders that have no object.
pub const NO_BEACON_OBJECT: i32 = -2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransponderDef {
    pub track_position: f64,
    pub kind: i32,
    pub data: i32,
    pub position: Vector2,
    /// Target section. Resolved against the sections list by the builder.
    pub section: i32,
    /// Beacon object, `-1` for none or [`NO_BEACON_OBJECT`].
    pub beacon_object: i32,
    pub clip_to_first_red_section: bool,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl TransponderDef {
    /// Object-less transponder at `track_position`.
    pub fn bare(track_position: f64, kind: i32, data: i32, section: i32) -> Self {
        Self {
            track_position,
            kind,
            data,
            position: Vector2::ZERO,
            section,
            beacon_object: NO_BEACON_OBJECT,
            clip_to_first_red_section: false,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestinationDef {
    pub track_position: f64,
    pub kind: i32,
    pub trigger_once: bool,
    pub beacon_object: i32,
    pub next: i32,
    pub previous: i32,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitDef {
    pub track_position: f64,
    /// Speed in m/s, infinite when unlimited.
    pub speed: f64,
    pub direction: i32,
    pub course: i32,
    pub rail: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopDef {
    pub track_position: f64,
    pub station: usize,
    pub direction: i32,
    pub forward_tolerance: f64,
    pub backward_tolerance: f64,
    pub cars: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SoundSource {
    /// Plays on the train when passed. Speed 0 plays at the recorded pitch.
    Train { speed: f64 },
    /// Stationary world sound.
    World,
    /// Microphone picking up train noise within the given ranges.
    Microphone { forward: f64, backward: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackSound {
    pub track_position: f64,
    pub file: Option<String>,
    pub source: SoundSource,
    pub position: Vector2,
    pub all_cars: bool,
    pub rail: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessDef {
    pub track_position: f64,
    pub value: f64,
}

/// Fog start used when fog is disabled.
pub const NO_FOG_START: f64 = 800.0;
/// Fog end used when fog is disabled.
pub const NO_FOG_END: f64 = 1600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub start: f64,
    pub end: f64,
    pub color: [u8; 3],
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            start: NO_FOG_START,
            end: NO_FOG_END,
            color: [128, 128, 128],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HornKind {
    Primary,
    Secondary,
    Music,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HornBlowDef {
    pub track_position: f64,
    pub kind: HornKind,
    pub trigger_once: bool,
    pub beacon_object: i32,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightDefinition {
    pub ambient: [u8; 3],
    pub diffuse: [u8; 3],
    pub direction: Vector3,
}

impl LightDefinition {
    /// Light direction for spherical angles given in degrees.
    pub fn direction_from_angles(theta: f64, phi: f64) -> Vector3 {
        let (theta, phi) = (theta.to_radians(), phi.to_radians());
        let dx = theta.cos() * phi.sin();
        let dy = -theta.sin();
        let dz = theta.cos() * phi.cos();
        Vector3::new(-dx, -dy, -dz)
    }
}

impl Default for LightDefinition {
    fn default() -> Self {
        Self {
            ambient: [160, 160, 160],
            diffuse: [160, 160, 160],
            direction: Self::direction_from_angles(60.0, -26.565_051_177_078),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightingChange {
    Static {
        previous: LightDefinition,
        next: LightDefinition,
    },
    Dynamic {
        previous: Option<i32>,
        next: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternObject {
    pub rail: usize,
    pub interval: f64,
    pub position: Vector2,
    pub types: Vec<i32>,
    pub last_placement: f64,
    pub ends: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchDef {
    pub second_rail: usize,
    pub initial_setting: usize,
    pub trailing: bool,
    pub spring_return: bool,
    pub fixed_route: bool,
    pub name: Option<String>,
    pub track_names: [Option<String>; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub track_position: f64,
    pub rail: usize,
    pub text: Option<String>,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferStop {
    pub rail: usize,
    pub track_position: f64,
    pub affects_ai: bool,
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Curve state that persists until changed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackState {
    pub curve_radius: f64,
    pub curve_cant: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    // Continuing state.
    pub rails: Slots<Rail>,
    pub rail_types: Vec<usize>,
    pub rail_cycles: Vec<RailCycle>,
    pub poles: Vec<Pole>,
    pub walls: Slots<WallDike>,
    pub dikes: Slots<WallDike>,
    pub pattern_objects: BTreeMap<i32, PatternObject>,
    pub ground_cycle: Vec<usize>,
    pub fog: Fog,
    pub pitch: f64,
    pub track: TrackState,
    pub light_definition: LightDefinition,
    pub dynamic_light: Option<i32>,
    pub rain_intensity: i32,
    pub snow_intensity: i32,
    pub weather_object: Option<i32>,

    // Per-block state.
    pub fog_defined: bool,
    pub turn: f64,
    pub background: Option<usize>,
    pub height: Option<f64>,
    pub station: Option<usize>,
    pub station_pass_alarm: bool,

    // One-shot collections.
    pub forms: Vec<Form>,
    pub cracks: Vec<Crack>,
    pub rail_free_objects: Slots<Vec<FreeObject>>,
    pub ground_free_objects: Vec<FreeObject>,
    pub sections: Vec<SectionDef>,
    pub signals: Vec<SignalDef>,
    pub transponders: Vec<TransponderDef>,
    pub destinations: Vec<DestinationDef>,
    pub limits: Vec<LimitDef>,
    pub stops: Vec<StopDef>,
    pub sounds: Vec<TrackSound>,
    pub brightness: Vec<BrightnessDef>,
    pub horn_blows: Vec<HornBlowDef>,
    pub lighting_changes: Vec<LightingChange>,
    pub switches: Slots<SwitchDef>,
    pub points_of_interest: Vec<PointOfInterest>,
    pub buffers: Vec<BufferStop>,
}

impl Block {
    /// Block 0: rail 0 running, default section at position 0.
    pub fn initial(is_rw: bool) -> Self {
        let mut rails = Slots::new();
        rails.insert(
            0,
            Rail {
                started: true,
                driveable: true,
                ..Rail::default()
            },
        );
        Self {
            rails,
            rail_types: vec![0],
            rail_cycles: vec![RailCycle::default()],
            poles: Vec::new(),
            walls: Slots::new(),
            dikes: Slots::new(),
            pattern_objects: BTreeMap::new(),
            ground_cycle: Vec::new(),
            fog: Fog::default(),
            pitch: 0.0,
            track: TrackState::default(),
            light_definition: LightDefinition::default(),
            dynamic_light: None,
            rain_intensity: 0,
            snow_intensity: 0,
            weather_object: None,
            fog_defined: false,
            turn: 0.0,
            background: Some(0),
            height: Some(if is_rw { 0.3 } else { 0.0 }),
            station: None,
            station_pass_alarm: false,
            forms: Vec::new(),
            cracks: Vec::new(),
            rail_free_objects: Slots::new(),
            ground_free_objects: Vec::new(),
            sections: vec![SectionDef {
                track_position: 0.0,
                aspects: vec![0, 4],
                departure_station: None,
                kind: SectionKind::IndexBased,
                invisible: false,
            }],
            signals: Vec::new(),
            transponders: Vec::new(),
            destinations: Vec::new(),
            limits: Vec::new(),
            stops: Vec::new(),
            sounds: Vec::new(),
            brightness: Vec::new(),
            horn_blows: Vec::new(),
            lighting_changes: Vec::new(),
            switches: Slots::new(),
            points_of_interest: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// The block following `self`, carrying continuing state and advancing
    /// rail cycles by one step.
    pub fn next(&self, catalog: &Catalog) -> Self {
        let mut rails = Slots::new();
        for (i, rail) in self.rails.iter() {
            rails.insert(i, rail.continued());
        }

        let mut rail_types = self.rail_types.clone();
        let mut rail_cycles = self.rail_cycles.clone();
        for (rail, rc) in rail_cycles.iter_mut().enumerate() {
            let Some(cycle) = rc.cycle.and_then(|c| catalog.rail_cycle(c)) else {
                continue;
            };
            if cycle.len() > 1 {
                rc.current = if rc.current + 1 >= cycle.len() {
                    0
                } else {
                    rc.current + 1
                };
                grow_to(&mut rail_types, rail);
                rail_types[rail] = cycle[rc.current];
            }
        }

        let pattern_objects = self
            .pattern_objects
            .iter()
            .filter(|(_, p)| !p.ends)
            .map(|(k, p)| (*k, p.clone()))
            .collect();

        Self {
            rails,
            rail_types,
            rail_cycles,
            poles: self.poles.clone(),
            walls: self.walls.clone(),
            dikes: self.dikes.clone(),
            pattern_objects,
            ground_cycle: self.ground_cycle.clone(),
            fog: self.fog,
            pitch: self.pitch,
            track: self.track,
            light_definition: self.light_definition,
            dynamic_light: self.dynamic_light,
            rain_intensity: self.rain_intensity,
            snow_intensity: self.snow_intensity,
            weather_object: self.weather_object,
            fog_defined: false,
            turn: 0.0,
            background: None,
            height: None,
            station: None,
            station_pass_alarm: false,
            forms: Vec::new(),
            cracks: Vec::new(),
            rail_free_objects: Slots::new(),
            ground_free_objects: Vec::new(),
            sections: Vec::new(),
            signals: Vec::new(),
            transponders: Vec::new(),
            destinations: Vec::new(),
            limits: Vec::new(),
            stops: Vec::new(),
            sounds: Vec::new(),
            brightness: Vec::new(),
            horn_blows: Vec::new(),
            lighting_changes: Vec::new(),
            switches: Slots::new(),
            points_of_interest: Vec::new(),
            buffers: Vec::new(),
        }
    }

    /// True when rail `index` exists and is started in this block.
    pub fn rail_started(&self, index: usize) -> bool {
        self.rails.get(index).is_some_and(|r| r.started)
    }

    /// Grows the per-rail type and cycle arrays to cover `index`.
    pub fn grow_rail_arrays(&mut self, index: usize) {
        grow_to(&mut self.rail_types, index);
        grow_to(&mut self.rail_cycles, index);
    }
}

// ---------------------------------------------------------------------------
// Route-wide parse data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerColor {
    Black,
    Gray,
    White,
    Red,
    Orange,
    Green,
    Blue,
    Magenta,
}

impl MarkerColor {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "black" | "1" => Some(Self::Black),
            "gray" | "2" => Some(Self::Gray),
            "white" | "3" => Some(Self::White),
            "red" | "4" => Some(Self::Red),
            "orange" | "5" => Some(Self::Orange),
            "green" | "6" => Some(Self::Green),
            "blue" | "7" => Some(Self::Blue),
            "magenta" | "8" => Some(Self::Magenta),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkerMessage {
    Image { file: String },
    Text { text: String, color: MarkerColor },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub start: f64,
    pub end: f64,
    pub message: MarkerMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreTrainInstruction {
    pub track_position: f64,
    pub time: f64,
}

/// Everything one parse pass produces before the builder runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteData {
    pub blocks: Vec<Block>,
    pub stations: Vec<Station>,
    pub markers: Vec<Marker>,
    pub pretrain: Vec<PreTrainInstruction>,
    pub block_interval: f64,
    pub track_position: f64,
}

impl RouteData {
    pub fn new(block_interval: f64, is_rw: bool) -> Self {
        Self {
            blocks: vec![Block::initial(is_rw)],
            stations: Vec::new(),
            markers: Vec::new(),
            pretrain: Vec::new(),
            block_interval,
            track_position: 0.0,
        }
    }

    /// Creates blocks up to and including `index`.
    pub fn create_missing_blocks(&mut self, index: usize, catalog: &Catalog) {
        while self.blocks.len() <= index {
            let next = match self.blocks.last() {
                Some(last) => last.next(catalog),
                None => Block::initial(false),
            };
            self.blocks.push(next);
        }
    }

    /// Block index for a track position.
    pub fn block_index_for(&self, position: f64) -> usize {
        (position / self.block_interval + 0.001).floor().max(0.0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;

    #[test]
    fn slots_grow_on_insert() {
        let mut s: Slots<u8> = Slots::new();
        assert!(s.is_empty());
        s.insert(3, 7);
        assert_eq!(s.len(), 4);
        assert!(s.contains(3));
        assert!(!s.contains(1));
        assert_eq!(s.remove(3), Some(7));
        assert!(s.is_empty());
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn slots_iterate_in_index_order() {
        let mut s = Slots::new();
        s.insert(5, 'b');
        s.insert(1, 'a');
        let got: Vec<_> = s.iter().collect();
        assert_eq!(got, vec![(1, &'a'), (5, &'b')]);
    }

    #[test]
    fn initial_block_defaults() {
        let b = Block::initial(true);
        assert!(b.rail_started(0));
        assert_eq!(b.height, Some(0.3));
        assert_eq!(b.background, Some(0));
        assert_eq!(b.sections.len(), 1);
        assert_eq!(b.sections[0].aspects, vec![0, 4]);
        assert_eq!(b.rail_cycles[0].cycle, None);
    }

    #[test]
    fn next_block_carries_rails_and_resets_one_shots() {
        let cat = Catalog::default();
        let mut b = Block::initial(false);
        let rail = b.rails.get_or_insert_with(2, Rail::default);
        rail.started = true;
        rail.end = Vector2::new(3.8, 0.0);
        b.turn = 0.01;
        b.pitch = 0.005;
        b.track.curve_radius = 600.0;
        let n = b.next(&cat);
        let r = n.rails.get(2).unwrap();
        assert!(r.started);
        assert_eq!(r.start, Vector2::new(3.8, 0.0));
        assert_eq!(n.turn, 0.0);
        assert_eq!(n.pitch, 0.005);
        assert_eq!(n.track.curve_radius, 600.0);
        assert_eq!(n.height, None);
        assert_eq!(n.background, None);
        assert!(n.sections.is_empty());
    }

    #[test]
    fn rail_cycles_advance_and_wrap() {
        let mut cb = CatalogBuilder::new();
        cb.rail_cycle(4, vec![10, 11, 12]);
        let cat = cb.build();
        let mut b = Block::initial(false);
        b.rail_cycles[0] = RailCycle {
            cycle: Some(4),
            current: 0,
        };
        b.rail_types[0] = 10;
        let b1 = b.next(&cat);
        let b2 = b1.next(&cat);
        let b3 = b2.next(&cat);
        assert_eq!(
            [b1.rail_types[0], b2.rail_types[0], b3.rail_types[0]],
            [11, 12, 10]
        );
    }

    #[test]
    fn create_missing_blocks_fills_gap() {
        let mut data = RouteData::new(25.0, false);
        data.create_missing_blocks(4, &Catalog::default());
        assert_eq!(data.blocks.len(), 5);
        assert_eq!(data.block_index_for(99.0), 3);
        assert_eq!(data.block_index_for(100.0), 4);
    }

    #[test]
    fn direction_zero_depends_on_context() {
        assert_eq!(Direction::parse("0", true), Some(Direction::Both));
        assert_eq!(Direction::parse("0", false), Some(Direction::None));
        assert_eq!(Direction::parse("left", false), Some(Direction::Left));
        assert_eq!(Direction::parse("x", true), None);
    }
}
