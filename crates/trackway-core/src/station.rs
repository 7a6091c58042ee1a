//! Stations and the compact arrival/departure sub-grammar.
//!
//! # Arrival field
//!
//! | Text | Meaning |
//! |---|---|
//! | `P`, `L` | all trains pass |
//! | `B`, `B:time` | player passes, others stop |
//! | `S`, `S:time` | player stops, others pass |
//! | `D` | dummy station |
//! | `.` | explicitly blank |
//! | `time` | all stop, arriving at `time` |
//!
//! # Departure field
//!
//! | Text | Meaning |
//! |---|---|
//! | `T`, `=`, `T:time` | terminal |
//! | `C`, `C:time` | change ends |
//! | `J:n:time` | jump to station `n` |
//! | `.` | explicitly blank |
//! | `time` | departure time |

use serde::{Deserialize, Serialize};

use crate::units::{parse_i32_legacy, parse_time};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMode {
    #[default]
    AllStop,
    AllPass,
    PlayerStop,
    PlayerPass,
}

impl StopMode {
    /// Whether the player's train is expected to stop.
    pub fn player_stops(self) -> bool {
        matches!(self, Self::AllStop | Self::PlayerStop)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StationKind {
    #[default]
    Normal,
    ChangeEnds,
    Terminal,
    /// Jump to the station with the given index after departure.
    Jump(i32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetySystem {
    #[default]
    Ats,
    Atc,
}

/// A physical stopping zone attached to a station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationStop {
    pub track_position: f64,
    pub direction: i32,
    pub forward_tolerance: f64,
    pub backward_tolerance: f64,
    pub cars: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    /// Seconds since midnight.
    pub arrival_time: Option<f64>,
    pub departure_time: Option<f64>,
    pub stop_time: f64,
    pub stop_mode: StopMode,
    pub kind: StationKind,
    pub dummy: bool,
    pub force_stop_signal: bool,
    pub open_left_doors: bool,
    pub open_right_doors: bool,
    pub safety_system: SafetySystem,
    pub arrival_sound: Option<String>,
    pub departure_sound: Option<String>,
    pub passenger_ratio: f64,
    pub timetable_day: Option<usize>,
    pub timetable_night: Option<usize>,
    pub default_track_position: f64,
    pub reopen_door: f64,
    pub reopen_station_limit: i32,
    pub interference_in_door: f64,
    pub max_interfering_object_rate: i32,
    pub stops: Vec<StationStop>,
}

impl Default for Station {
    fn default() -> Self {
        Self {
            name: String::new(),
            arrival_time: None,
            departure_time: None,
            stop_time: 15.0,
            stop_mode: StopMode::AllStop,
            kind: StationKind::Normal,
            dummy: false,
            force_stop_signal: false,
            open_left_doors: true,
            open_right_doors: true,
            safety_system: SafetySystem::Ats,
            arrival_sound: None,
            departure_sound: None,
            passenger_ratio: 1.0,
            timetable_day: None,
            timetable_night: None,
            default_track_position: 0.0,
            reopen_door: 0.0,
            reopen_station_limit: 0,
            interference_in_door: 0.0,
            max_interfering_object_rate: 10,
            stops: Vec::new(),
        }
    }
}

impl Station {
    /// Track position of the stop a train of `cars` cars uses. Falls back to
    /// the last declared stop, or the station's declaration position.
    pub fn stop_position(&self, cars: i32) -> f64 {
        self.stops
            .iter()
            .find(|s| cars <= s.cars || s.cars == 0)
            .or_else(|| self.stops.last())
            .map_or(self.default_track_position, |s| s.track_position)
    }
}

// ---------------------------------------------------------------------------
// Sub-grammar
// ---------------------------------------------------------------------------

/// Result of parsing the arrival field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Arrival {
    pub time: Option<f64>,
    pub stop_mode: StopMode,
    pub dummy: bool,
    /// The time part was present but malformed.
    pub invalid_time: bool,
}

/// Result of parsing the departure field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Departure {
    pub time: Option<f64>,
    pub kind: StationKind,
    pub invalid_time: bool,
    /// A `J:` jump target that did not parse.
    pub invalid_jump: bool,
}

/// Strips a case-insensitive `X:` prefix.
fn strip_code<'a>(s: &'a str, code: char) -> Option<&'a str> {
    let mut chars = s.chars();
    let first = chars.next()?;
    if first.eq_ignore_ascii_case(&code) && chars.next() == Some(':') {
        Some(s[2..].trim_start())
    } else {
        None
    }
}

fn timed(text: &str) -> (Option<f64>, bool) {
    match parse_time(text) {
        Some(t) => (Some(t), false),
        None => (None, true),
    }
}

/// Parses the arrival field. `allow_dummy` enables the `D` code, which only
/// the full `Sta` form understands; `allow_blank` enables `.`.
pub fn parse_arrival(text: &str, allow_dummy: bool, allow_blank: bool) -> Arrival {
    let mut a = Arrival::default();
    if text.is_empty() {
        return a;
    }
    if text.eq_ignore_ascii_case("P") || text.eq_ignore_ascii_case("L") {
        a.stop_mode = StopMode::AllPass;
    } else if text.eq_ignore_ascii_case("B") {
        a.stop_mode = StopMode::PlayerPass;
    } else if let Some(rest) = strip_code(text, 'B') {
        a.stop_mode = StopMode::PlayerPass;
        (a.time, a.invalid_time) = timed(rest);
    } else if text.eq_ignore_ascii_case("S") {
        a.stop_mode = StopMode::PlayerStop;
    } else if let Some(rest) = strip_code(text, 'S') {
        a.stop_mode = StopMode::PlayerStop;
        (a.time, a.invalid_time) = timed(rest);
    } else if allow_blank && text == "." {
        // blank
    } else if allow_dummy && text.eq_ignore_ascii_case("D") {
        a.dummy = true;
    } else {
        (a.time, a.invalid_time) = timed(text);
    }
    a
}

/// Parses the departure field. `allow_jump` enables `J:n:time` and
/// `allow_blank` enables `.`.
pub fn parse_departure(text: &str, allow_jump: bool, allow_blank: bool) -> Departure {
    let mut d = Departure::default();
    if text.is_empty() {
        return d;
    }
    if text.eq_ignore_ascii_case("T") || text == "=" {
        d.kind = StationKind::Terminal;
    } else if let Some(rest) = strip_code(text, 'T') {
        d.kind = StationKind::Terminal;
        (d.time, d.invalid_time) = timed(rest);
    } else if text.eq_ignore_ascii_case("C") {
        d.kind = StationKind::ChangeEnds;
    } else if let Some(rest) = strip_code(text, 'C') {
        d.kind = StationKind::ChangeEnds;
        (d.time, d.invalid_time) = timed(rest);
    } else if allow_jump && strip_code(text, 'J').is_some() {
        let mut parts = text.split(':').skip(1);
        if let Some(target) = parts.next() {
            match parse_i32_legacy(target.trim_start()) {
                Some(n) => d.kind = StationKind::Jump(n),
                None => d.invalid_jump = true,
            }
        }
        if let Some(time) = parts.next() {
            (d.time, d.invalid_time) = timed(time.trim_start());
        }
    } else if allow_blank && text == "." {
        // blank
    } else {
        (d.time, d.invalid_time) = timed(text);
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_codes() {
        assert_eq!(parse_arrival("P", true, true).stop_mode, StopMode::AllPass);
        assert_eq!(parse_arrival("l", true, true).stop_mode, StopMode::AllPass);
        let b = parse_arrival("B:8.30", true, true);
        assert_eq!(b.stop_mode, StopMode::PlayerPass);
        assert_eq!(b.time, Some(30600.0));
        assert!(parse_arrival("D", true, true).dummy);
        assert!(parse_arrival("D", false, false).invalid_time);
        assert_eq!(parse_arrival(".", true, true), Arrival::default());
    }

    #[test]
    fn arrival_plain_time() {
        let a = parse_arrival("8.30", true, true);
        assert_eq!(a.time, Some(30600.0));
        assert_eq!(a.stop_mode, StopMode::AllStop);
        assert!(parse_arrival("soon", true, true).invalid_time);
    }

    #[test]
    fn departure_codes() {
        let t = parse_departure("T:8.35", true, true);
        assert_eq!(t.kind, StationKind::Terminal);
        assert_eq!(t.time, Some(30900.0));
        assert_eq!(parse_departure("=", true, true).kind, StationKind::Terminal);
        assert_eq!(parse_departure("c", true, true).kind, StationKind::ChangeEnds);
    }

    #[test]
    fn departure_jump() {
        let j = parse_departure("J:2:9.00", true, true);
        assert_eq!(j.kind, StationKind::Jump(2));
        assert_eq!(j.time, Some(32400.0));
        let bad = parse_departure("J:x", true, true);
        assert!(bad.invalid_jump);
        assert_eq!(bad.kind, StationKind::Normal);
    }

    #[test]
    fn stop_position_prefers_matching_car_count() {
        let mut s = Station::default();
        s.default_track_position = 100.0;
        assert_eq!(s.stop_position(4), 100.0);
        for (pos, cars) in [(110.0, 4), (130.0, 8)] {
            s.stops.push(StationStop {
                track_position: pos,
                direction: 0,
                forward_tolerance: 5.0,
                backward_tolerance: 5.0,
                cars,
            });
        }
        assert_eq!(s.stop_position(3), 110.0);
        assert_eq!(s.stop_position(6), 130.0);
        assert_eq!(s.stop_position(12), 130.0);
    }
}
