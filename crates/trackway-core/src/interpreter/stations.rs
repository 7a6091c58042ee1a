//! Stations, stop points and buffers.

use super::{existing_file, invalid};
use crate::block::{BufferStop, Direction, StopDef};
use crate::catalog::StructureKind;
use crate::command::Invocation;
use crate::context::{ParseContext, Parsed};
use crate::station::{SafetySystem, Station, parse_arrival, parse_departure};

/// Appends `station` and makes it current in the active block.
fn open_station(ctx: &mut ParseContext<'_>, station: Station, pass_alarm: bool) -> usize {
    let index = ctx.data.stations.len();
    ctx.data.stations.push(station);
    ctx.current_station = Some(index);
    ctx.current_stop = -1;
    ctx.departure_signal_used = false;
    let block = ctx.block();
    block.station = Some(index);
    block.station_pass_alarm = pass_alarm;
    index
}

/// Arrival and departure fields shared by `Sta` and `Station`.
fn timetable_fields(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, station: &mut Station, full: bool) {
    if let Some(text) = inv.arg(1) {
        let arrival = parse_arrival(text, full, full);
        if arrival.invalid_time {
            invalid(ctx, inv, "ArrivalTime");
        }
        station.arrival_time = arrival.time;
        station.stop_mode = arrival.stop_mode;
        station.dummy = arrival.dummy;
    }
    if let Some(text) = inv.arg(2) {
        let departure = parse_departure(text, full, full);
        if departure.invalid_jump {
            invalid(ctx, inv, "JumpIndex");
        }
        if departure.invalid_time {
            invalid(ctx, inv, "DepartureTime");
        }
        station.departure_time = departure.time;
        station.kind = departure.kind;
    }
}

/// Safety system selector: `ats`, `atc`, `0` or `1`. With hacks enabled a
/// name prefix is enough.
fn safety_system(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize, prefix_hack: bool) -> SafetySystem {
    let Some(text) = inv.arg(index) else {
        return SafetySystem::Ats;
    };
    let lower = text.to_ascii_lowercase();
    if lower == "ats" || (prefix_hack && lower.starts_with("ats")) {
        return SafetySystem::Ats;
    }
    if lower == "atc" || (prefix_hack && lower.starts_with("atc")) {
        return SafetySystem::Atc;
    }
    match inv.int(index) {
        Parsed::Value(1) => SafetySystem::Atc,
        Parsed::Value(0) => SafetySystem::Ats,
        Parsed::Value(_) => {
            ctx.error(format!(
                "System is expected to be either 0 or 1 in {}",
                inv.command.name()
            ));
            SafetySystem::Ats
        }
        _ => {
            invalid(ctx, inv, "System");
            SafetySystem::Ats
        }
    }
}

/// Clamps a negative value to zero with an Error.
fn non_negative<T: PartialOrd + Default>(
    ctx: &mut ParseContext<'_>,
    inv: &Invocation<'_>,
    what: &str,
    value: T,
) -> T {
    if value < T::default() {
        ctx.error(format!(
            "{what} is expected to be non-negative in {}",
            inv.command.name()
        ));
        T::default()
    } else {
        value
    }
}

/// `Sta`: the full station form.
pub(super) fn sta(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let mut station = Station {
        name: inv.arg(0).unwrap_or_default().to_string(),
        default_track_position: ctx.track_position(),
        ..Station::default()
    };
    timetable_fields(ctx, inv, &mut station, true);

    let pass_alarm = ctx.int_or(inv, 3, "PassAlarm", 0);
    let door = inv
        .arg(4)
        .map_or(Some(Direction::Both), |s| Direction::parse(s, false))
        .unwrap_or_else(|| {
            invalid(ctx, inv, "Doors");
            Direction::Both
        });
    station.open_left_doors = door.includes_left();
    station.open_right_doors = door.includes_right();
    station.force_stop_signal = ctx.int_or(inv, 5, "ForcedRedSignal", 0) == 1;
    station.safety_system = safety_system(ctx, inv, 6, false);
    station.arrival_sound = existing_file(ctx, inv, 7, "ArrivalSound");

    let mut halt = ctx.double_or(inv, 8, "StopDuration", 15.0);
    if halt < 0.0 {
        ctx.error(format!(
            "StopDuration is expected to be non-negative in {}",
            inv.command.name()
        ));
        halt = 15.0;
    } else if halt < 5.0 {
        halt = 5.0;
    }
    station.stop_time = halt;

    let mut jam = ctx.double_or(inv, 9, "PassengerRatio", 100.0);
    if jam < 0.0 {
        ctx.error(format!(
            "PassengerRatio is expected to be non-negative in {}",
            inv.command.name()
        ));
        jam = 100.0;
    }
    station.passenger_ratio = 0.01 * jam;
    station.departure_sound = existing_file(ctx, inv, 10, "DepartureSound");

    let explicit = match inv.int(11) {
        Parsed::Value(i) if i < 0 => {
            ctx.error(format!(
                "TimetableIndex is expected to be non-negative in {}",
                inv.command.name()
            ));
            None
        }
        Parsed::Value(i) => {
            let i = i as usize;
            let day = ctx.catalog.has(StructureKind::TimetableDay, i);
            let night = ctx.catalog.has(StructureKind::TimetableNight, i);
            if !day && !night {
                ctx.error(format!(
                    "TimetableIndex references textures not loaded in {}",
                    inv.command.name()
                ));
                None
            } else {
                Some((day.then_some(i), night.then_some(i)))
            }
        }
        _ => None,
    };
    (station.timetable_day, station.timetable_night) = match explicit {
        Some(textures) => textures,
        None => match ctx.data.stations.last() {
            Some(previous) => (previous.timetable_day, previous.timetable_night),
            None if ctx.catalog.has(StructureKind::TimetableDay, 0)
                && ctx.catalog.has(StructureKind::TimetableNight, 0) =>
            {
                (Some(0), Some(0))
            }
            None => (None, None),
        },
    };

    let reopen = ctx.double_or(inv, 12, "ReopenDoor", 0.0);
    station.reopen_door = 0.01 * non_negative(ctx, inv, "ReopenDoor", reopen);
    let limit = ctx.int_or(inv, 13, "ReopenStationLimit", 5);
    station.reopen_station_limit = non_negative(ctx, inv, "ReopenStationLimit", limit);

    station.interference_in_door = match inv.double(14) {
        Parsed::Value(v) => non_negative(ctx, inv, "InterferenceInDoor", v),
        Parsed::Missing => ctx.rng.next_f64() * 30.0,
        Parsed::Invalid => {
            invalid(ctx, inv, "InterferenceInDoor");
            ctx.rng.next_f64() * 30.0
        }
    };
    station.max_interfering_object_rate = match inv.int(15) {
        Parsed::Value(v) if (1..=99).contains(&v) => v,
        Parsed::Missing => ctx.rng.range(1, 99),
        _ => {
            ctx.error(format!(
                "MaxInterferingObjectRate is expected to be between 1 and 99 in {}",
                inv.command.name()
            ));
            ctx.rng.range(1, 99)
        }
    };

    let number = ctx.data.stations.len() + 1;
    if station.name.is_empty() && station.stop_mode.player_stops() {
        if station.open_left_doors || station.open_right_doors {
            station.name = format!("Station {number}");
        } else if station.force_stop_signal {
            station.dummy = true;
        }
    }
    open_station(ctx, station, pass_alarm == 1);
}

/// `Station`: the short station form with fixed defaults.
pub(super) fn station(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let mut station = Station {
        name: inv.arg(0).unwrap_or_default().to_string(),
        default_track_position: ctx.track_position(),
        ..Station::default()
    };
    timetable_fields(ctx, inv, &mut station, false);
    station.force_stop_signal = ctx.int_or(inv, 3, "ForcedRedSignal", 0) == 1;
    station.safety_system = safety_system(ctx, inv, 4, ctx.options.enable_hacks);
    station.departure_sound = existing_file(ctx, inv, 5, "DepartureSound");

    let number = ctx.data.stations.len() + 1;
    if station.name.is_empty() && station.stop_mode.player_stops() {
        station.name = format!("Station {number}");
        if station.force_stop_signal && ctx.options.is_rw {
            // an unnamed RW station with a forced red signal only controls signalling
            station.dummy = true;
            station.name.clear();
            station.open_left_doors = false;
            station.open_right_doors = false;
        }
    }
    open_station(ctx, station, false);
}

/// `StationXML`: a station described by an external file. Only the file's
/// existence is checked; its contents are read by the loader.
pub(super) fn station_xml(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(file) = inv.arg(0) else {
        invalid(ctx, inv, "FileName");
        return;
    };
    if !ctx.catalog.has_file(file) {
        ctx.file_not_found(format!(
            "Station XML file {file} not found in {}",
            inv.command.name()
        ));
        return;
    }
    let stem = file
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file)
        .rsplit_once('.')
        .map_or(file, |(stem, _)| stem);
    let station = Station {
        name: stem.to_string(),
        default_track_position: ctx.track_position(),
        ..Station::default()
    };
    open_station(ctx, station, false);
}

/// `Stop` / `StopPos`: a stop point for the current station.
pub(super) fn stop(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(station) = ctx.current_station else {
        ctx.error(format!(
            "A stop without a station is invalid in {}",
            inv.command.name()
        ));
        return;
    };
    let direction = ctx.int_or(inv, 0, "Direction", 0);
    let tolerance = |ctx: &mut ParseContext<'_>, index: usize, what: &str| {
        let v = ctx.length_or(inv, index, what, 5.0);
        if v <= 0.0 {
            ctx.error(format!(
                "{what} is expected to be positive in {}",
                inv.command.name()
            ));
            5.0
        } else {
            v
        }
    };
    let backward = tolerance(ctx, 1, "BackwardTolerance");
    let forward = tolerance(ctx, 2, "ForwardTolerance");
    let cars = ctx.int_or(inv, 3, "Cars", 0);
    let track_position = ctx.track_position();
    ctx.block().stops.push(StopDef {
        track_position,
        station,
        direction,
        forward_tolerance: forward,
        backward_tolerance: backward,
        cars,
    });
    ctx.current_stop = cars;
}

/// `Buffer`: a buffer stop on rail 0.
pub(super) fn buffer(ctx: &mut ParseContext<'_>, _inv: &Invocation<'_>) {
    let track_position = ctx.track_position();
    ctx.block().buffers.push(BufferStop {
        rail: 0,
        track_position,
        affects_ai: true,
    });
}
