//! Parser options and the per-parse mutable context.
//!
//! Every handler receives a [`ParseContext`]: the options, the frozen catalog,
//! the diagnostics sink and the cross-command state (current station, stop
//! and section). Nothing is global, so independent parses can run side by
//! side.

use serde::{Deserialize, Serialize};

use crate::block::{Block, RouteData};
use crate::catalog::Catalog;
use crate::command::Invocation;
use crate::diagnostics::{Diagnostic, DiagnosticSink, Severity, SourceLocation};
use crate::rng::RouteRng;
use crate::units::{parse_byte, parse_f64_legacy, parse_i32_legacy, parse_length, parse_time};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Dialect and unit settings for one compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Block length in metres.
    pub block_interval: f64,
    /// Positional length multiplier chain.
    pub unit_of_length: Vec<f64>,
    /// Metres per second per speed unit.
    pub unit_of_speed: f64,
    pub signed_cant: bool,
    pub value_based_sections: bool,
    /// RW dialect: `[Section]` headers, `@` separators, `;` comments.
    pub is_rw: bool,
    pub ignore_pitch_roll: bool,
    pub enable_hacks: bool,
    /// Track gauge in metres, used by the inaccuracy model.
    pub rail_gauge: f64,
    /// Seed for the default door interference draw.
    pub seed: u64,
    /// Set by the loader when the route declares a dynamic light set. Static
    /// light commands are ignored while it is set.
    pub dynamic_lighting: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            block_interval: 25.0,
            unit_of_length: vec![1.0],
            unit_of_speed: 0.277_777_777_777_778,
            signed_cant: false,
            value_based_sections: false,
            is_rw: false,
            ignore_pitch_roll: false,
            enable_hacks: false,
            rail_gauge: 1.435,
            seed: 0,
            dynamic_lighting: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Argument parsing
// ---------------------------------------------------------------------------

/// Outcome of reading one positional argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    /// Absent or empty.
    Missing,
    Value(T),
    /// Present but malformed.
    Invalid,
}

impl<T> Parsed<T> {
    fn from_option(text: Option<&str>, parse: impl FnOnce(&str) -> Option<T>) -> Self {
        match text {
            None => Self::Missing,
            Some(t) => parse(t).map_or(Self::Invalid, Self::Value),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl Invocation<'_> {
    /// Argument `index` if present and non-empty.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args
            .get(index)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn int(&self, index: usize) -> Parsed<i32> {
        Parsed::from_option(self.arg(index), parse_i32_legacy)
    }

    pub fn double(&self, index: usize) -> Parsed<f64> {
        Parsed::from_option(self.arg(index), parse_f64_legacy)
    }

    pub fn length(&self, index: usize, unit_of_length: &[f64]) -> Parsed<f64> {
        Parsed::from_option(self.arg(index), |s| parse_length(s, unit_of_length))
    }

    pub fn time(&self, index: usize) -> Parsed<f64> {
        Parsed::from_option(self.arg(index), parse_time)
    }

    pub fn byte(&self, index: usize) -> Parsed<u8> {
        Parsed::from_option(self.arg(index), parse_byte)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Mutable state threaded through every command handler.
pub struct ParseContext<'a> {
    pub options: &'a ParserOptions,
    pub catalog: &'a Catalog,
    sink: &'a mut dyn DiagnosticSink,
    pub rng: RouteRng,
    pub data: RouteData,
    pub current_station: Option<usize>,
    /// Car count of the last stop, `-1` before any stop of the current
    /// station.
    pub current_stop: i32,
    pub current_section: i32,
    pub departure_signal_used: bool,
    pub block_index: usize,
    pub location: SourceLocation,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        options: &'a ParserOptions,
        catalog: &'a Catalog,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        Self {
            options,
            catalog,
            sink,
            rng: RouteRng::new(options.seed),
            data: RouteData::new(options.block_interval, options.is_rw),
            current_station: None,
            current_stop: -1,
            current_section: 0,
            departure_signal_used: false,
            block_index: 0,
            location: SourceLocation::default(),
        }
    }

    /// The block at the current track position.
    pub fn block(&mut self) -> &mut Block {
        let i = self.block_index;
        &mut self.data.blocks[i]
    }

    pub fn block_ref(&self) -> &Block {
        &self.data.blocks[self.block_index]
    }

    pub fn track_position(&self) -> f64 {
        self.data.track_position
    }

    pub fn block_interval(&self) -> f64 {
        self.options.block_interval
    }

    pub fn unit_of_length(&self) -> &'a [f64] {
        &self.options.unit_of_length
    }

    /// Moves to `position`, creating any blocks up to it.
    pub fn set_track_position(&mut self, position: f64) {
        self.data.track_position = position;
        self.block_index = self.data.block_index_for(position);
        self.data
            .create_missing_blocks(self.block_index, self.catalog);
    }

    // -- diagnostics --------------------------------------------------------

    pub fn report(&mut self, severity: Severity, file_not_found: bool, message: String) {
        self.sink.emit(Diagnostic {
            severity,
            file_not_found,
            message,
            location: self.location.clone(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.report(Severity::Info, false, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, false, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, false, message.into());
    }

    pub fn file_not_found(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, true, message.into());
    }

    // -- defaulted arguments ------------------------------------------------

    /// Integer argument, falling back to `default` with an Error when
    /// malformed and silently when missing.
    pub fn int_or(&mut self, inv: &Invocation<'_>, index: usize, what: &str, default: i32) -> i32 {
        match inv.int(index) {
            Parsed::Value(v) => v,
            Parsed::Missing => default,
            Parsed::Invalid => {
                self.error(format!("{what} is invalid in {}", inv.command.name()));
                default
            }
        }
    }

    pub fn double_or(
        &mut self,
        inv: &Invocation<'_>,
        index: usize,
        what: &str,
        default: f64,
    ) -> f64 {
        match inv.double(index) {
            Parsed::Value(v) => v,
            Parsed::Missing => default,
            Parsed::Invalid => {
                self.error(format!("{what} is invalid in {}", inv.command.name()));
                default
            }
        }
    }

    pub fn length_or(
        &mut self,
        inv: &Invocation<'_>,
        index: usize,
        what: &str,
        default: f64,
    ) -> f64 {
        match inv.length(index, self.unit_of_length()) {
            Parsed::Value(v) => v,
            Parsed::Missing => default,
            Parsed::Invalid => {
                self.error(format!("{what} is invalid in {}", inv.command.name()));
                default
            }
        }
    }

    pub fn byte_or(&mut self, inv: &Invocation<'_>, index: usize, what: &str, default: u8) -> u8 {
        match inv.byte(index) {
            Parsed::Value(v) => v,
            Parsed::Missing => default,
            Parsed::Invalid => {
                self.error(format!(
                    "{what} is required to be within the range from 0 to 255 in {}",
                    inv.command.name()
                ));
                default
            }
        }
    }

    /// Yaw, pitch and roll in radians from three consecutive arguments.
    pub fn orientation(&mut self, inv: &Invocation<'_>, first: usize) -> (f64, f64, f64) {
        let yaw = self.double_or(inv, first, "Yaw", 0.0);
        let pitch = self.double_or(inv, first + 1, "Pitch", 0.0);
        let roll = self.double_or(inv, first + 2, "Roll", 0.0);
        (yaw.to_radians(), pitch.to_radians(), roll.to_radians())
    }

    /// Binds the current station to a new section when it forces a red
    /// departure signal and the binding has not happened yet.
    pub fn take_departure_station(&mut self) -> Option<usize> {
        let station = self.current_station?;
        if !self.data.stations[station].force_stop_signal {
            return None;
        }
        if self.current_stop >= 0 && !self.departure_signal_used {
            self.departure_signal_used = true;
            Some(station)
        } else {
            None
        }
    }
}
