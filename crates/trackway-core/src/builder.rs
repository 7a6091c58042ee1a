//! Track element builder: turns the block store into the compiled route.
//!
//! # Pipeline
//!
//! 1. **Extend** -- append run-out blocks past the last track position.
//! 2. **Heights** -- interpolate undefined block heights.
//! 3. **Walk** -- advance a world cursor block by block, recording one
//!    [`TrackElement`] per block and attaching its events.
//! 4. **Orphans** -- place transponders that never met their section, and
//!    destination changes.
//! 5. **Stations** -- attach station end events, default points of interest
//!    and fix up stop modes.
//! 6. **Cant** -- convert block cant to point cant and compute tangents.
//!
//! The builder never fails on route content. A reference that cannot be
//! resolved is kept as a placeholder and reported through the sink.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::block::{
    Block, PointOfInterest, PowerSupply, PowerSupplyKind, RouteData, SoundSource, TransponderDef,
};
use crate::cancel::{self, CancelFlag};
use crate::catalog::Catalog;
use crate::context::ParserOptions;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity, SourceLocation};
use crate::element::{Route, Section, Signal, Switch, TrackElement, Transponder};
use crate::event::{Event, EventKind};
use crate::interpreter::sign;
use crate::math::{Vector2, Vector3};
use crate::station::{StationKind, StationStop, StopMode};
use crate::script::CompileError;

/// Run-out length appended after the last track position.
const RUN_OUT: f64 = 600.0;

/// Tightest curve allowed in the final block. Tighter curves are
/// straightened so the run-out does not loop back into view.
const MIN_FINAL_RADIUS: f64 = 300.0;

/// Offset of the point sound from the element start.
const POINT_SOUND_DELTA: f64 = 12.5;

/// Elements between the pass alarm and its station.
const PASS_ALARM_LEAD: usize = 6;

/// Blocks between cancellation checks.
const CANCEL_STRIDE: usize = 16;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Builds the compiled route from one parse pass.
pub fn build_route(
    mut data: RouteData,
    options: &ParserOptions,
    catalog: &Catalog,
    sink: &mut dyn DiagnosticSink,
    cancel: Option<&CancelFlag>,
) -> Result<Route, CompileError> {
    debug!(blocks = data.blocks.len(), "extending block store");
    extend_blocks(&mut data, catalog);
    interpolate_heights(&mut data.blocks);

    let mut walk = Walk::new(&data, options);
    for i in 0..data.blocks.len() {
        if i % CANCEL_STRIDE == 0 && cancel::requested(cancel) {
            warn!(block = i, "route build cancelled");
            return Err(CompileError::Cancelled);
        }
        walk.block(&mut data, i);
    }
    debug!(elements = walk.elements.len(), "track walked");

    walk.orphans(&data);
    walk.station_ends(&data);
    let mut route = walk.finish(data, options);
    finalize_stations(&mut route, sink);
    convert_cant(&mut route.elements);
    compute_cant_tangents(&mut route.elements);

    info!(
        elements = route.elements.len(),
        events = route.event_count(),
        stations = route.stations.len(),
        sections = route.sections.len(),
        "route built"
    );
    Ok(route)
}

/// Appends run-out blocks so the track continues past the last command.
fn extend_blocks(data: &mut RouteData, catalog: &Catalog) {
    let last = ((data.track_position + RUN_OUT) / data.block_interval + 0.001).floor() as usize + 1;
    if let Some(b) = data.blocks.last_mut()
        && b.track.curve_radius.abs() < MIN_FINAL_RADIUS
    {
        b.track.curve_radius = 0.0;
    }
    data.create_missing_blocks(last.saturating_sub(1), catalog);
}

/// Fills undefined heights linearly between defined blocks and carries the
/// last defined height forward.
pub(crate) fn interpolate_heights(blocks: &mut [Block]) {
    let mut last_defined: Option<usize> = None;
    for i in 0..blocks.len() {
        let Some(b) = blocks[i].height else {
            continue;
        };
        if let Some(j) = last_defined {
            let a = blocks[j].height.unwrap_or(0.0);
            let d = (b - a) / (i - j) as f64;
            for (step, k) in (j + 1..i).enumerate() {
                blocks[k].height = Some(a + d * (step + 1) as f64);
            }
        }
        last_defined = Some(i);
    }
    let carried = last_defined.and_then(|z| blocks[z].height).unwrap_or(0.0);
    let start = last_defined.map_or(0, |z| z + 1);
    for b in &mut blocks[start..] {
        b.height = Some(carried);
    }
}

// ---------------------------------------------------------------------------
// Walk
// ---------------------------------------------------------------------------

/// Transponder waiting for its section to be declared.
struct Pending {
    block: usize,
    index: usize,
}

/// World cursor and running state while walking the blocks.
struct Walk {
    interval: f64,
    position: Vector3,
    direction: Vector2,
    elements: Vec<TrackElement>,
    sections: Vec<Section>,
    signals: Vec<Signal>,
    transponders: Vec<Transponder>,
    switches: Vec<Switch>,
    buffers: Vec<crate::block::BufferStop>,
    points_of_interest: Vec<PointOfInterest>,
    pending: Vec<Pending>,
    background: usize,
    brightness: f64,
    brightness_position: f64,
    /// Element and event index of the last brightness change.
    brightness_event: Option<(usize, usize)>,
    previous_fog: crate::block::Fog,
    current_fog: crate::block::Fog,
    speed_limit: f64,
    power: BTreeMap<PowerSupplyKind, PowerSupply>,
}

impl Walk {
    fn new(data: &RouteData, options: &ParserOptions) -> Self {
        let (brightness, brightness_position) = data
            .blocks
            .iter()
            .find_map(|b| b.brightness.first())
            .map_or((1.0, 0.0), |b| (b.value, b.track_position));
        Self {
            interval: options.block_interval,
            position: Vector3::ZERO,
            direction: Vector2::FORWARD,
            elements: Vec::with_capacity(data.blocks.len()),
            sections: Vec::new(),
            signals: Vec::new(),
            transponders: Vec::new(),
            switches: Vec::new(),
            buffers: Vec::new(),
            points_of_interest: Vec::new(),
            pending: Vec::new(),
            background: data.blocks.first().and_then(|b| b.background).unwrap_or(0),
            brightness,
            brightness_position,
            brightness_event: None,
            previous_fog: Default::default(),
            current_fog: Default::default(),
            speed_limit: f64::INFINITY,
            power: BTreeMap::new(),
        }
    }

    fn block(&mut self, data: &mut RouteData, i: usize) {
        let start = i as f64 * self.interval;
        let end = start + self.interval;
        self.direction = self.direction.normalize();

        let block = &data.blocks[i];
        let rail0 = block.rails.get(0);
        let world_direction = Vector3::from_heading(self.direction, block.pitch);
        let world_side = Vector3::new(self.direction.y, 0.0, -self.direction.x);
        let mut element = TrackElement {
            start_position: start,
            world_position: self.position,
            world_direction,
            world_up: world_direction.cross(world_side),
            world_side,
            pitch: block.pitch,
            curve_radius: block.track.curve_radius,
            curve_cant: block.track.curve_cant,
            curve_cant_tangent: 0.0,
            height: block.height.unwrap_or(0.0),
            adhesion: rail0.map_or(1.0, |r| r.adhesion),
            accuracy: rail0.map_or(2.0, |r| r.accuracy),
            rain_intensity: block.rain_intensity,
            snow_intensity: block.snow_intensity,
            power_supplies: rail0.map(|r| r.power_supplies.clone()).unwrap_or_default(),
            events: Vec::new(),
        };
        let n = self.elements.len();
        let events = &mut element.events;

        // background
        if let Some(next) = block.background {
            let previous = if i == 0 { next } else { self.background };
            events.push(Event::new(0.0, EventKind::BackgroundChange { previous, next }));
            self.background = next;
        }

        // brightness
        for b in &block.brightness {
            let m = events.len();
            events.push(Event::new(
                b.track_position - start,
                EventKind::BrightnessChange {
                    value: b.value,
                    previous: self.brightness,
                    previous_distance: b.track_position - self.brightness_position,
                    next: b.value,
                    next_distance: 0.0,
                },
            ));
            if let Some((pe, pm)) = self.brightness_event {
                let distance = b.track_position - self.brightness_position;
                let target = if pe == n {
                    events.get_mut(pm)
                } else {
                    self.elements.get_mut(pe).and_then(|e| e.events.get_mut(pm))
                };
                if let Some(Event {
                    kind:
                        EventKind::BrightnessChange {
                            next,
                            next_distance,
                            ..
                        },
                    ..
                }) = target
                {
                    *next = b.value;
                    *next_distance = distance;
                }
            }
            self.brightness_event = Some((n, m));
            self.brightness = b.value;
            self.brightness_position = b.track_position;
        }

        // fog
        if i == 0 {
            self.current_fog = block.fog;
            self.previous_fog = block.fog;
        } else {
            events.push(Event::new(
                0.0,
                EventKind::FogChange {
                    previous: self.previous_fog,
                    current: self.current_fog,
                    next: block.fog,
                },
            ));
            self.previous_fog = self.current_fog;
            self.current_fog = block.fog;
        }

        // point sound
        if let Some(next_block) = data.blocks.get(i + 1) {
            let crosses = block.rails.iter().any(|(j, rail)| {
                rail.started
                    && next_block.rails.get(j).is_some_and(|nr| {
                        sign(rail.start.x) != sign(nr.end.x) && rail.start.y * nr.end.y <= 0.0
                    })
            });
            if crosses {
                events.push(Event::new(POINT_SOUND_DELTA, EventKind::PointSound));
            }
        }

        // station
        if let Some(s) = block.station {
            events.push(Event::new(0.0, EventKind::StationStart { station: s }));
            if block.station_pass_alarm && n >= PASS_ALARM_LEAD {
                self.elements[n - PASS_ALARM_LEAD]
                    .events
                    .push(Event::new(0.0, EventKind::StationPassAlarm));
            }
        }
        for stop in &block.stops {
            if let Some(station) = data.stations.get_mut(stop.station) {
                station.stops.push(StationStop {
                    track_position: stop.track_position,
                    direction: stop.direction,
                    forward_tolerance: stop.forward_tolerance,
                    backward_tolerance: stop.backward_tolerance,
                    cars: stop.cars,
                });
            }
        }

        // limits
        for limit in block.limits.iter().filter(|l| l.rail == 0) {
            events.push(Event::new(
                limit.track_position - start,
                EventKind::LimitChange {
                    previous: self.speed_limit,
                    next: limit.speed,
                },
            ));
            self.speed_limit = limit.speed;
        }

        // markers
        for (j, marker) in data.markers.iter().enumerate() {
            if marker.start >= start && marker.start < end {
                events.push(Event::new(marker.start - start, EventKind::MarkerStart { marker: j }));
            }
            if marker.end >= start && marker.end < end {
                events.push(Event::new(marker.end - start, EventKind::MarkerEnd { marker: j }));
            }
        }

        // train sounds
        for sound in &block.sounds {
            if let (SoundSource::Train { speed }, Some(file)) = (sound.source, &sound.file) {
                events.push(Event::new(
                    sound.track_position - start,
                    EventKind::TrainSound {
                        file: file.clone(),
                        speed,
                        all_cars: sound.all_cars,
                        rail: sound.rail,
                    },
                ));
            }
        }

        // lighting
        for change in &block.lighting_changes {
            events.push(Event::new(0.0, EventKind::Lighting(*change)));
        }

        // horns
        for horn in &block.horn_blows {
            events.push(Event::new(
                horn.track_position - start,
                EventKind::HornBlow {
                    kind: horn.kind,
                    trigger_once: horn.trigger_once,
                },
            ));
        }

        // power supply
        if element.power_supplies != self.power {
            events.push(Event::new(
                0.0,
                EventKind::PowerSupplyChange {
                    previous: self.power.clone(),
                    next: element.power_supplies.clone(),
                },
            ));
            self.power = element.power_supplies.clone();
        }

        // signals
        for s in &block.signals {
            self.signals.push(Signal {
                track_position: s.track_position,
                section: s.section,
                object: s.object,
                position: s.position,
                yaw: s.yaw,
                pitch: s.pitch,
                roll: s.roll,
                show_object: s.show_object,
                show_post: s.show_post,
            });
        }

        // sections, with the transponders waiting for them
        self.pending
            .extend((0..block.transponders.len()).map(|index| Pending { block: i, index }));
        for def in &block.sections {
            let m = self.sections.len();
            let mut k = 0;
            while k < self.pending.len() {
                let p = &self.pending[k];
                let t = &data.blocks[p.block].transponders[p.index];
                if t.section != m as i32 {
                    k += 1;
                    continue;
                }
                let event = place_transponder(
                    &mut self.transponders,
                    t,
                    t.track_position - p.block as f64 * self.interval,
                    m as i32,
                );
                if p.block == i {
                    events.push(event);
                } else {
                    self.elements[p.block].events.push(event);
                }
                self.pending.remove(k);
            }
            self.sections.push(Section {
                track_position: def.track_position,
                aspects: def.aspects.clone(),
                kind: def.kind,
                departure_station: def.departure_station,
                invisible: def.invisible,
                previous: m.checked_sub(1),
                next: None,
            });
            if m > 0 {
                self.sections[m - 1].next = Some(m);
            }
            events.push(Event::new(
                def.track_position - start,
                EventKind::SectionChange {
                    previous: m as i32 - 1,
                    next: m as i32,
                },
            ));
        }

        // transponders whose section already exists
        let declared = self.sections.len() as i32;
        let mut k = 0;
        while k < self.pending.len() {
            let p = &self.pending[k];
            let bound = if p.block == i {
                block
                    .transponders
                    .get(p.index)
                    .filter(|t| (0..declared).contains(&t.section))
            } else {
                None
            };
            if let Some(t) = bound {
                events.push(place_transponder(
                    &mut self.transponders,
                    t,
                    t.track_position - start,
                    t.section,
                ));
                self.pending.remove(k);
            } else {
                k += 1;
            }
        }

        // buffers
        for b in &block.buffers {
            events.push(Event::new(b.track_position - start, EventKind::Buffer { rail: b.rail }));
            self.buffers.push(*b);
        }

        // switches
        for (rail, def) in block.switches.iter() {
            events.push(Event::new(
                0.0,
                EventKind::Switch {
                    rail,
                    second_rail: def.second_rail,
                },
            ));
            self.switches.push(Switch {
                track_position: start,
                rail,
                def: def.clone(),
            });
        }

        self.points_of_interest
            .extend(block.points_of_interest.iter().cloned());

        // turn
        if block.turn != 0.0 {
            let ag = -block.turn.atan();
            let (cos, sin) = (ag.cos(), ag.sin());
            self.direction = self.direction.rotate(cos, sin);
            element.world_direction = element.world_direction.rotate_plane(cos, sin);
            element.world_side = element.world_side.rotate_plane(cos, sin);
            element.world_up = element.world_direction.cross(element.world_side);
        }

        // curve
        let (a, c, h) = advance(self.interval, block.pitch, block.track.curve_radius);
        if a != 0.0 {
            self.direction = self.direction.rotate((-a).cos(), (-a).sin());
        }
        self.position.x += self.direction.x * c;
        self.position.y += h;
        self.position.z += self.direction.y * c;
        if a != 0.0 {
            self.direction = self.direction.rotate((-a).cos(), (-a).sin());
        }

        self.elements.push(element);
    }

    /// Places transponders that never met their section and destination
    /// changes.
    fn orphans(&mut self, data: &RouteData) {
        for p in std::mem::take(&mut self.pending) {
            let t = &data.blocks[p.block].transponders[p.index];
            let section = if t.section >= 0 { -1 } else { t.section };
            let delta = t.track_position - self.elements[p.block].start_position;
            let event = place_transponder(&mut self.transponders, t, delta, section);
            self.elements[p.block].events.push(event);
        }
        for (i, block) in data.blocks.iter().enumerate() {
            for d in &block.destinations {
                let delta = d.track_position - self.elements[i].start_position;
                self.elements[i].events.push(Event::new(
                    delta,
                    EventKind::Destination {
                        kind: d.kind,
                        next: d.next,
                        previous: d.previous,
                        trigger_once: d.trigger_once,
                    },
                ));
            }
        }
    }

    /// Station end events one block past the last stop's tolerance.
    fn station_ends(&mut self, data: &RouteData) {
        for (s, station) in data.stations.iter().enumerate() {
            let Some(last) = station.stops.last() else {
                continue;
            };
            let p = last.track_position + last.forward_tolerance + self.interval;
            let k = (p / self.interval).floor();
            if k >= 0.0 && (k as usize) < self.elements.len() {
                let k = k as usize;
                let delta = p - k as f64 * self.interval;
                self.elements[k]
                    .events
                    .push(Event::new(delta, EventKind::StationEnd { station: s }));
            }
        }
    }

    fn finish(mut self, data: RouteData, options: &ParserOptions) -> Route {
        if let Some(last) = self.elements.last_mut() {
            last.events.push(Event::new(self.interval, EventKind::TrackEnd));
        }
        // followers fire in array order; equal deltas keep their kind order
        for e in &mut self.elements {
            e.events.sort_by(|a, b| a.delta.total_cmp(&b.delta));
        }
        self.transponders
            .sort_by(|a, b| a.track_position.total_cmp(&b.track_position));
        if self.points_of_interest.is_empty() {
            self.points_of_interest = default_points_of_interest(&data);
        }
        Route {
            block_interval: self.interval,
            rail_gauge: options.rail_gauge,
            elements: self.elements,
            stations: data.stations,
            sections: self.sections,
            signals: self.signals,
            transponders: self.transponders,
            markers: data.markers,
            switches: self.switches,
            pretrain_instructions: data.pretrain,
            buffer_positions: self.buffers,
            points_of_interest: self.points_of_interest,
            diagnostics: Vec::new(),
        }
    }
}

/// Records `t` in the route table and returns its event.
fn place_transponder(
    table: &mut Vec<Transponder>,
    t: &TransponderDef,
    delta: f64,
    section: i32,
) -> Event {
    table.push(Transponder {
        track_position: t.track_position,
        kind: t.kind,
        data: t.data,
        section,
        clip_to_first_red_section: t.clip_to_first_red_section,
    });
    Event::new(
        delta,
        EventKind::Transponder {
            kind: t.kind,
            data: t.data,
            section,
            clip_to_first_red_section: t.clip_to_first_red_section,
        },
    )
}

/// Heading change `a`, chord length `c` and rise `h` over one block of
/// length `d` with gradient `p` and radius `r`.
pub(crate) fn advance(d: f64, p: f64, r: f64) -> (f64, f64, f64) {
    if r != 0.0 {
        let s = d / (1.0 + p * p).sqrt();
        let h = s * p;
        let b = s / r.abs();
        let c = (2.0 * r * r * (1.0 - b.cos())).max(0.0).sqrt();
        (0.5 * sign(r) * b, c, h)
    } else if p != 0.0 {
        let c = d / (1.0 + p * p).sqrt();
        (0.0, c, c * p)
    } else {
        (0.0, d, 0.0)
    }
}

/// One point of interest per station with stops, at its first stop.
fn default_points_of_interest(data: &RouteData) -> Vec<PointOfInterest> {
    data.stations
        .iter()
        .filter_map(|station| {
            let stop = station.stops.first()?;
            let x = match (station.open_left_doors, station.open_right_doors) {
                (true, false) => -2.5,
                (false, true) => 2.5,
                _ => 0.0,
            };
            Some(PointOfInterest {
                track_position: stop.track_position,
                rail: 0,
                text: Some(station.name.clone()),
                position: Vector2::new(x, 2.8),
                yaw: 0.0,
                pitch: 0.0,
                roll: 0.0,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Finalization
// ---------------------------------------------------------------------------

fn warn_route(sink: &mut dyn DiagnosticSink, message: String) {
    sink.emit(Diagnostic {
        severity: Severity::Warning,
        file_not_found: false,
        message,
        location: SourceLocation::default(),
    });
}

/// Resolves stop modes and station kinds that depend on neighbours.
fn finalize_stations(route: &mut Route, sink: &mut dyn DiagnosticSink) {
    let count = route.stations.len();
    for i in 0..count {
        let station = &mut route.stations[i];
        if station.stops.is_empty() && station.stop_mode != StopMode::AllPass {
            warn_route(
                sink,
                format!(
                    "Station {} expects trains to stop but does not define stop points at track position {}",
                    station.name, station.default_track_position
                ),
            );
            station.stop_mode = StopMode::AllPass;
        }
        if station.kind == StationKind::ChangeEnds {
            if i + 1 < count {
                let name = station.name.clone();
                let next = &mut route.stations[i + 1];
                if next.stop_mode != StopMode::AllStop {
                    warn_route(
                        sink,
                        format!(
                            "Station {name} is marked as \"change ends\" but the subsequent station does not expect all trains to stop"
                        ),
                    );
                    next.stop_mode = StopMode::AllStop;
                }
            } else {
                warn_route(
                    sink,
                    format!(
                        "Station {} is marked as \"change ends\" but there is no subsequent station defined",
                        station.name
                    ),
                );
                station.kind = StationKind::Terminal;
            }
        }
    }
    if let Some(last) = route.stations.last_mut() {
        last.kind = StationKind::Terminal;
    }
}

/// Spreads block cant onto element boundaries: zero takes the previous
/// value, equal signs keep the larger magnitude, opposite signs average.
pub(crate) fn convert_cant(elements: &mut [TrackElement]) {
    for i in (1..elements.len()).rev() {
        let prev = elements[i - 1].curve_cant;
        let cur = elements[i].curve_cant;
        if cur == 0.0 {
            elements[i].curve_cant = prev;
        } else if prev != 0.0 {
            if sign(prev) == sign(cur) {
                if prev.abs() > cur.abs() {
                    elements[i].curve_cant = prev;
                }
            } else {
                elements[i].curve_cant = 0.5 * (cur + prev);
            }
        }
    }
}

/// Hermite tangents for cant interpolation, limited to avoid overshoot.
pub fn compute_cant_tangents(elements: &mut [TrackElement]) {
    let n = elements.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        elements[0].curve_cant_tangent = 0.0;
        return;
    }
    let deltas: Vec<f64> = elements
        .windows(2)
        .map(|w| w[1].curve_cant - w[0].curve_cant)
        .collect();
    let mut tangents = vec![0.0; n];
    tangents[0] = deltas[0];
    tangents[n - 1] = deltas[n - 2];
    for i in 1..n - 1 {
        tangents[i] = 0.5 * (deltas[i - 1] + deltas[i]);
    }
    for i in 0..n - 1 {
        if deltas[i] == 0.0 {
            tangents[i] = 0.0;
            tangents[i + 1] = 0.0;
        } else {
            let a = tangents[i] / deltas[i];
            let b = tangents[i + 1] / deltas[i];
            if a * a + b * b > 9.0 {
                let t = 3.0 / (a * a + b * b).sqrt();
                tangents[i] = t * a * deltas[i];
                tangents[i + 1] = t * b * deltas[i];
            }
        }
    }
    for (e, t) in elements.iter_mut().zip(tangents) {
        e.curve_cant_tangent = t;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn straight_track_advances_along_z() {
        let h = Harness::new();
        let route = h.build();
        let e = &route.elements;
        // 600 m of run-out past position 0
        assert_eq!(e.len(), 25);
        assert!(close(e[4].world_position.z, 100.0));
        assert!(close(e[4].world_position.x, 0.0));
        assert_eq!(e[4].world_up, Vector3::UP);
        assert_eq!(e.last().map(|l| l.events.last().map(|x| &x.kind)), Some(Some(&EventKind::TrackEnd)));
    }

    #[test]
    fn full_circle_closes() {
        // 2*pi*r = 25 * 64 blocks
        let r = 25.0 * 64.0 / std::f64::consts::TAU;
        let mut h = Harness::new();
        h.run("Curve", &[&r.to_string()]);
        h.at(64.0 * 25.0);
        h.run("Curve", &["0"]);
        let route = h.build();
        let p = route.elements[64].world_position;
        assert!(p.x.abs() < 1e-6 && p.z.abs() < 1e-6, "{p:?}");
        let d = route.elements[64].world_direction;
        assert!(close(d.z, 1.0));
        // right-hand curve bends towards +x
        assert!(route.elements[16].world_position.x > 0.0);
    }

    #[test]
    fn pitch_raises_track() {
        let mut h = Harness::new();
        h.run("Pitch", &["10"]);
        let route = h.build();
        let y = route.elements[1].world_position.y;
        let expected = 25.0 / (1.0f64 + 0.0001).sqrt() * 0.01;
        assert!(close(y, expected));
        assert!(route.elements[1].world_direction.y > 0.0);
    }

    #[test]
    fn heights_interpolate_and_carry() {
        let mut h = Harness::new();
        h.at(100.0);
        h.run("Height", &["4"]);
        let route = h.build();
        let heights: Vec<f64> = route.elements[..6].iter().map(|e| e.height).collect();
        assert_eq!(heights, vec![0.0, 1.0, 2.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn cant_tangents_are_zero_on_flat_runs() {
        let mut e: Vec<TrackElement> = (0..4).map(|i| TrackElement::straight(i as f64 * 25.0)).collect();
        e[2].curve_cant = 0.1;
        e[3].curve_cant = 0.1;
        compute_cant_tangents(&mut e);
        // a flat neighbour on either side zeroes the tangent
        assert!(e.iter().all(|e| e.curve_cant_tangent == 0.0));

        let mut e: Vec<TrackElement> = (0..3).map(|i| TrackElement::straight(i as f64 * 25.0)).collect();
        e[1].curve_cant = 0.1;
        e[2].curve_cant = 0.2;
        compute_cant_tangents(&mut e);
        assert!(close(e[1].curve_cant_tangent, 0.1));
    }

    #[test]
    fn cant_tangents_are_limited() {
        let mut e: Vec<TrackElement> = (0..3).map(|i| TrackElement::straight(i as f64 * 25.0)).collect();
        e[1].curve_cant = 0.1;
        e[2].curve_cant = 0.1001;
        compute_cant_tangents(&mut e);
        let d = 0.0001;
        let a = e[1].curve_cant_tangent / d;
        let b = e[2].curve_cant_tangent / d;
        assert!(a * a + b * b <= 9.0 + 1e-9);
    }

    #[test]
    fn block_cant_becomes_point_cant() {
        let mut e: Vec<TrackElement> = (0..4).map(|i| TrackElement::straight(i as f64 * 25.0)).collect();
        e[1].curve_cant = 0.1;
        e[2].curve_cant = -0.1;
        convert_cant(&mut e);
        // opposite signs meet at their mean, zero cant takes the previous one
        assert_eq!(e[1].curve_cant, 0.1);
        assert_eq!(e[2].curve_cant, 0.0);
        assert_eq!(e[3].curve_cant, -0.1);
    }

    #[test]
    fn sections_bind_waiting_transponders() {
        let mut h = Harness::new();
        h.run("Beacon", &["10", "-1", "1"]);
        h.at(50.0);
        h.run("Section", &["0", "2"]);
        let route = h.build();
        assert_eq!(route.sections.len(), 2);
        assert_eq!(route.sections[0].next, Some(1));
        let bound = route.elements[0].events.iter().find_map(|e| match e.kind {
            EventKind::Transponder { section, .. } => Some(section),
            _ => None,
        });
        assert_eq!(bound, Some(1));
        assert_eq!(route.transponders.len(), 1);
        let t = &route.transponders[0];
        assert_eq!(t.track_position, 0.0);
        assert_eq!(t.kind, 10);
        assert_eq!(t.section, 1);
    }

    #[test]
    fn transponder_table_follows_track_position() {
        let mut h = Harness::new();
        h.at(60.0);
        h.run("Beacon", &["3", "-1", "5"]);
        h.at(70.0);
        h.run("Beacon", &["4", "-1", "0", "8"]);
        let route = h.build();
        let kinds: Vec<(i32, i32)> = route.transponders.iter().map(|t| (t.kind, t.section)).collect();
        assert_eq!(kinds, vec![(3, -1), (4, 0)]);
        assert_eq!(route.transponders[1].data, 8);
        assert_eq!(route.transponders[1].track_position, 70.0);
    }

    #[test]
    fn element_events_are_in_track_order() {
        let mut h = Harness::new();
        h.at(5.0);
        h.run("Section", &["0", "2"]);
        h.at(20.0);
        h.run("Limit", &["60"]);
        let route = h.build();
        for e in &route.elements {
            assert!(e.events.windows(2).all(|w| w[0].delta <= w[1].delta));
        }
        let events = &route.elements[0].events;
        let section = events
            .iter()
            .position(|e| matches!(e.kind, EventKind::SectionChange { next: 1, .. }));
        let limit = events
            .iter()
            .position(|e| matches!(e.kind, EventKind::LimitChange { .. }));
        assert!(section.is_some() && limit.is_some());
        assert!(section < limit);
    }

    #[test]
    fn unbound_transponders_get_no_section() {
        let mut h = Harness::new();
        h.run("Beacon", &["10", "-1", "5"]);
        let route = h.build();
        let bound = route.elements[0].events.iter().find_map(|e| match e.kind {
            EventKind::Transponder { section, .. } => Some(section),
            _ => None,
        });
        assert_eq!(bound, Some(-1));
    }

    #[test]
    fn stations_get_end_events_and_become_terminal() {
        let mut h = Harness::new();
        h.run("Sta", &["Central", "8.00", "8.01"]);
        h.at(100.0);
        h.run("Stop", &["1"]);
        let route = h.build();
        let s = &route.stations[0];
        assert_eq!(s.stops.len(), 1);
        assert_eq!(s.kind, StationKind::Terminal);
        // 100 + 5 m tolerance + one block
        let end = route.elements[5]
            .events
            .iter()
            .find(|e| matches!(e.kind, EventKind::StationEnd { .. }));
        assert!(end.is_some_and(|e| close(e.delta, 5.0)));
        assert_eq!(route.points_of_interest.len(), 1);
        assert_eq!(route.points_of_interest[0].text.as_deref(), Some("Central"));
    }

    #[test]
    fn station_without_stops_becomes_pass() {
        let mut h = Harness::new();
        h.run("Sta", &["Nowhere", "8.00", "8.01"]);
        let route = h.build();
        assert_eq!(route.stations[0].stop_mode, StopMode::AllPass);
    }

    #[test]
    fn limits_chain_previous_values() {
        let mut h = Harness::new();
        h.at(10.0);
        h.run("Limit", &["36"]);
        h.at(60.0);
        h.run("Limit", &["72"]);
        let route = h.build();
        let limits: Vec<(f64, f64)> = route
            .elements
            .iter()
            .flat_map(|e| e.events.iter())
            .filter_map(|e| match e.kind {
                EventKind::LimitChange { previous, next } => Some((previous, next)),
                _ => None,
            })
            .collect();
        assert_eq!(limits.len(), 2);
        assert_eq!(limits[0].0, f64::INFINITY);
        assert!(close(limits[0].1, 10.0));
        assert!(close(limits[1].0, 10.0));
    }

    #[test]
    fn advance_without_curve_or_pitch_is_identity() {
        assert_eq!(advance(25.0, 0.0, 0.0), (0.0, 25.0, 0.0));
        let (a, c, h) = advance(25.0, 0.0, -500.0);
        assert!(a < 0.0 && c < 25.0 && h == 0.0);
    }
}
