//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::block::{Block, RouteData};
use crate::builder::build_route;
use crate::catalog::{Catalog, CatalogBuilder, StructureKind};
use crate::command::{Invocation, TrackCommand, dispatch};
use crate::context::{ParseContext, ParserOptions};
use crate::diagnostics::{CollectingSink, Diagnostic, Severity};
use crate::element::Route;
use crate::script::{CompileInput, compile};

// ===========================================================================
// Catalogs
// ===========================================================================

/// Catalog builder with a representative set of structures:
///
/// - rails 0..=9, ground 0..=3, free objects 0..=9, beacons 0..=3
/// - walls L 0..=2 and R 0..=1, dikes L and R 0..=1
/// - forms 0..=1 on every side, roofs 1..=2, crack L 0..=1 and R 0
/// - backgrounds 0..=2, weather 0..=1, timetables 0..=1
/// - pole type 3 for one additional rail on top of the defaults
/// - files `bell.wav`, `signs/stop.png` and `stations/central.xml`
pub fn sample_catalog_builder() -> CatalogBuilder {
    let mut b = CatalogBuilder::new();
    b.structures(StructureKind::Rail, 0..=9)
        .structures(StructureKind::Ground, 0..=3)
        .structures(StructureKind::FreeObj, 0..=9)
        .structures(StructureKind::Beacon, 0..=3)
        .structures(StructureKind::WallL, 0..=2)
        .structures(StructureKind::WallR, 0..=1)
        .structures(StructureKind::DikeL, 0..=1)
        .structures(StructureKind::DikeR, 0..=1)
        .structures(StructureKind::CrackL, 0..=1)
        .structure(StructureKind::CrackR, 0)
        .structures(StructureKind::RoofL, 1..=2)
        .structures(StructureKind::RoofR, 1..=2)
        .structures(StructureKind::Background, 0..=2)
        .structures(StructureKind::Weather, 0..=1)
        .structures(StructureKind::TimetableDay, 0..=1)
        .structures(StructureKind::TimetableNight, 0..=1)
        .pole(1, 3)
        .file("bell.wav")
        .file("signs/stop.png")
        .file("stations/central.xml");
    for kind in [
        StructureKind::FormL,
        StructureKind::FormR,
        StructureKind::FormCL,
        StructureKind::FormCR,
    ] {
        b.structures(kind, 0..=1);
    }
    b
}

pub fn sample_catalog() -> Catalog {
    sample_catalog_builder().build()
}

// ===========================================================================
// Command harness
// ===========================================================================

enum Step {
    Move(f64),
    Run(TrackCommand, Vec<String>),
}

/// Cross-command state captured after the last replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarnessState {
    pub current_section: i32,
    pub current_station: Option<usize>,
    pub current_stop: i32,
}

/// Drives individual track commands against a fresh parse.
///
/// Every `run` or `at` call appends a step and replays the whole sequence, so
/// assertions always see the state a real parse would have produced.
pub struct Harness {
    options: ParserOptions,
    catalog: Catalog,
    steps: Vec<Step>,
    data: RouteData,
    diagnostics: Vec<Diagnostic>,
    state: HarnessState,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_catalog(sample_catalog())
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let options = ParserOptions::default();
        let data = RouteData::new(options.block_interval, options.is_rw);
        Self {
            options,
            catalog,
            steps: Vec::new(),
            data,
            diagnostics: Vec::new(),
            state: HarnessState {
                current_section: 0,
                current_station: None,
                current_stop: -1,
            },
        }
    }

    pub fn with_options(f: impl FnOnce(&mut ParserOptions)) -> Self {
        let mut h = Self::new();
        h.set_options(f);
        h
    }

    pub fn set_options(&mut self, f: impl FnOnce(&mut ParserOptions)) {
        f(&mut self.options);
        self.replay();
    }

    /// Runs `Track.<name>` with `args` at the current position.
    pub fn run(&mut self, name: &str, args: &[&str]) {
        let command = TrackCommand::from_name(name)
            .unwrap_or_else(|| panic!("unknown track command {name}"));
        let args = args.iter().map(|s| s.to_string()).collect();
        self.steps.push(Step::Run(command, args));
        self.replay();
    }

    /// Moves to track position `position`.
    pub fn at(&mut self, position: f64) {
        self.steps.push(Step::Move(position));
        self.replay();
    }

    fn replay(&mut self) {
        let mut sink = CollectingSink::new();
        let (data, state) = {
            let mut ctx = ParseContext::new(&self.options, &self.catalog, &mut sink);
            for step in &self.steps {
                match step {
                    Step::Move(p) => ctx.set_track_position(*p),
                    Step::Run(command, args) => dispatch(&mut ctx, &Invocation::new(*command, args)),
                }
            }
            let state = HarnessState {
                current_section: ctx.current_section,
                current_station: ctx.current_station,
                current_stop: ctx.current_stop,
            };
            (ctx.data, state)
        };
        self.data = data;
        self.state = state;
        self.diagnostics = sink.into_diagnostics();
    }

    pub fn block(&self, index: usize) -> &Block {
        &self.data.blocks[index]
    }

    pub fn data(&self) -> &RouteData {
        &self.data
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Diagnostics at `Error` or above.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn file_not_found_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.file_not_found).count()
    }

    /// Builds the current parse state into a route.
    pub fn build(&self) -> Route {
        let mut sink = CollectingSink::new();
        build_route(self.data.clone(), &self.options, &self.catalog, &mut sink, None)
            .unwrap_or_else(|e| panic!("build failed: {e}"))
    }
}

// ===========================================================================
// Script helpers
// ===========================================================================

/// Compiles CSV route text against the sample catalog with default options.
pub fn compile_csv(source: &str) -> Route {
    compile_with(source, &ParserOptions::default())
}

pub fn compile_with(source: &str, options: &ParserOptions) -> Route {
    let catalog = sample_catalog();
    let input = CompileInput::new("route.csv", source, options, &catalog);
    compile(&input, None).unwrap_or_else(|e| panic!("compile failed: {e}"))
}

/// Route text for a straight track of `blocks` blocks with an optional
/// curve radius applied from the start.
pub fn straight_source(blocks: usize, radius: Option<f64>) -> String {
    let mut s = String::from("With Track\n");
    if let Some(r) = radius {
        s.push_str(&format!("0, .Curve {r}\n"));
    }
    s.push_str(&format!("{}, .Height 0\n", blocks.saturating_sub(1) as f64 * 25.0));
    s
}
