//! Rails, track geometry and per-rail settings.

use super::{invalid, strict_int, warn_unstarted};
use crate::block::{Block, BufferStop, LimitDef, Rail, RailCycle, SwitchDef};
use crate::catalog::Catalog;
use crate::command::{Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};
use crate::units::parse_bool;

/// Binds rail `idx` to structure `kind`, following a rail cycle when the
/// catalog declares one under that index.
fn set_rail_structure(block: &mut Block, catalog: &Catalog, idx: usize, kind: usize) {
    block.grow_rail_arrays(idx);
    match catalog.rail_cycle(kind) {
        Some(cycle) => {
            block.rail_types[idx] = cycle[0];
            block.rail_cycles[idx] = RailCycle {
                cycle: Some(kind),
                current: 0,
            };
        }
        None => {
            block.rail_types[idx] = kind;
            block.rail_cycles[idx] = RailCycle::default();
        }
    }
}

/// Validates a structure index for a rail command. Returns the index when
/// the rail object exists.
fn rail_structure(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, kind: i32) -> Option<usize> {
    if kind < 0 {
        ctx.error(format!(
            "RailStructureIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        None
    } else if !ctx.catalog.has_rail(kind as usize) {
        ctx.error(format!(
            "RailStructureIndex {kind} references an object not loaded in {}",
            inv.command.name()
        ));
        None
    } else {
        Some(kind as usize)
    }
}

/// Optional lateral offset: `None` when the argument is empty, `0` after an
/// Error when malformed.
fn offset(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize, what: &str) -> Option<f64> {
    match inv.length(index, ctx.unit_of_length()) {
        Parsed::Value(v) => Some(v),
        Parsed::Missing => None,
        Parsed::Invalid => {
            invalid(ctx, inv, what);
            Some(0.0)
        }
    }
}

/// `Rail` / `RailStart`: opens (or moves) a rail within the current block.
pub(super) fn rail(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(idx) = strict_int(ctx, inv, 0, "RailIndex", 0) else {
        return;
    };
    if idx < 1 {
        ctx.error(format!(
            "RailIndex is expected to be positive in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    if inv.command == TrackCommand::RailStart && ctx.block_ref().rail_started(idx) {
        ctx.error(format!(
            "RailIndex {idx} is required to reference a non-existing rail in {}",
            inv.command.name()
        ));
    }

    let x = offset(ctx, inv, 1, "X");
    let y = offset(ctx, inv, 2, "Y");
    let structure = match inv.int(3) {
        Parsed::Missing => None,
        Parsed::Value(v) => rail_structure(ctx, inv, v),
        Parsed::Invalid => {
            invalid(ctx, inv, "RailStructureIndex");
            rail_structure(ctx, inv, 0)
        }
    };
    let cant = match inv.double(4) {
        Parsed::Value(c) => 0.001 * c,
        Parsed::Missing => 0.0,
        Parsed::Invalid => {
            if inv.arg(4) != Some("id 0") {
                invalid(ctx, inv, "CantInMillimeters");
            }
            0.0
        }
    };

    let catalog = ctx.catalog;
    let has_x = inv.args.len() >= 2;
    let has_y = inv.args.len() >= 3;
    let block = ctx.block();
    block.grow_rail_arrays(idx);
    let rail = block.rails.get_or_insert_with(idx, Rail::default);
    if rail.start_refreshed {
        rail.ended = true;
    }
    rail.started = true;
    rail.start_refreshed = true;
    if has_x {
        if let Some(x) = x {
            rail.start.x = x;
        }
        if !rail.ended {
            rail.end.x = rail.start.x;
        }
    }
    if has_y {
        if let Some(y) = y {
            rail.start.y = y;
        }
        if !rail.ended {
            rail.end.y = rail.start.y;
        }
    }
    rail.curve_cant = cant;
    if let Some(kind) = structure {
        set_rail_structure(block, catalog, idx, kind);
    }
}

pub(super) fn rail_end(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(idx) = strict_int(ctx, inv, 0, "RailIndex", 0) else {
        return;
    };
    if idx == 0 {
        ctx.error(format!("The command {} is invalid for rail 0", inv.command.name()));
        return;
    }
    if idx < 0 || !ctx.block_ref().rail_started(idx as usize) {
        ctx.error(format!(
            "RailIndex {idx} references a non-existing rail in {}",
            inv.command.name()
        ));
        return;
    }
    let x = offset(ctx, inv, 1, "X");
    let y = offset(ctx, inv, 2, "Y");
    if let Some(rail) = ctx.block().rails.get_mut(idx as usize) {
        rail.started = false;
        rail.start_refreshed = false;
        rail.ended = true;
        rail.driveable = false;
        if let Some(x) = x {
            rail.end.x = x;
        }
        if let Some(y) = y {
            rail.end.y = y;
        }
    }
}

pub(super) fn rail_type(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    let kind = ctx.int_or(inv, 1, "RailStructureIndex", 0);
    if idx < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    warn_unstarted(ctx, inv, idx);
    if let Some(kind) = rail_structure(ctx, inv, kind) {
        let catalog = ctx.catalog;
        set_rail_structure(ctx.block(), catalog, idx, kind);
    }
}

fn clamp_accuracy(acc: f64) -> f64 {
    acc.clamp(0.0, 4.0)
}

pub(super) fn accuracy(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let acc = clamp_accuracy(ctx.double_or(inv, 0, "Value", 2.0));
    ctx.block().rails.get_or_insert_with(0, Rail::default).accuracy = acc;
}

pub(super) fn pitch(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let p = ctx.double_or(inv, 0, "ValueInPermille", 0.0);
    ctx.block().pitch = 0.001 * p;
}

pub(super) fn curve(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let radius = ctx.length_or(inv, 0, "Radius", 0.0);
    let mut cant = 0.001 * ctx.double_or(inv, 1, "CantInMillimeters", 0.0);
    if ctx.options.signed_cant {
        if radius != 0.0 {
            cant *= radius.signum();
        }
    } else {
        cant = cant.abs() * sign(radius);
    }
    let track = &mut ctx.block().track;
    track.curve_radius = radius;
    track.curve_cant = cant;
}

/// Sign returning 0 for 0, unlike `f64::signum`.
pub(crate) fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub(super) fn turn(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let s = ctx.double_or(inv, 0, "Ratio", 0.0);
    ctx.block().turn = s;
}

fn adhesion_factor(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize) -> f64 {
    let mut a = ctx.double_or(inv, index, "Value", 100.0);
    if a < 0.0 {
        ctx.error(format!(
            "Value is expected to be non-negative in {}",
            inv.command.name()
        ));
        a = 100.0;
    }
    0.01 * a
}

pub(super) fn adhesion(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let a = adhesion_factor(ctx, inv, 0);
    ctx.block().rails.get_or_insert_with(0, Rail::default).adhesion = a;
}

pub(super) fn height(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let h = ctx.length_or(inv, 0, "Height", 0.0);
    let h = if ctx.options.is_rw { h + 0.3 } else { h };
    ctx.block().height = Some(h);
}

// ---------------------------------------------------------------------------
// Switches and per-rail commands
// ---------------------------------------------------------------------------

/// Reads a non-negative rail index that aborts the command when malformed.
fn required_rail(
    ctx: &mut ParseContext<'_>,
    inv: &Invocation<'_>,
    index: usize,
    what: &str,
) -> Option<usize> {
    let idx = strict_int(ctx, inv, index, what, 0)?;
    if idx < 0 {
        ctx.error(format!(
            "{what} is expected to be non-negative in {}",
            inv.command.name()
        ));
        return None;
    }
    Some(idx as usize)
}

/// Marks `rail` driveable backwards from the current block until the
/// segment boundary (`stop_at_start` selects a start or an end boundary).
fn mark_driveable(ctx: &mut ParseContext<'_>, rail: usize, stop_at_start: bool) {
    if rail == 0 {
        return;
    }
    let mut block = ctx.block_index;
    while block > 0 {
        let Some(r) = ctx.data.blocks[block].rails.get_mut(rail) else {
            break;
        };
        r.driveable = true;
        if (stop_at_start && r.started) || (!stop_at_start && r.ended) {
            break;
        }
        block -= 1;
    }
}

/// `Switch` / `SwitchT`: facing or trailing points between two rails.
pub(super) fn switch(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(first) = required_rail(ctx, inv, 0, "RailIndex1") else {
        return;
    };
    let Some(second) = required_rail(ctx, inv, 1, "RailIndex2") else {
        return;
    };
    let Some(initial) = strict_int(ctx, inv, 2, "InitialSetting", first as i32) else {
        return;
    };
    let initial = if initial < 0 {
        ctx.error(format!(
            "InitialSetting is expected to be non-negative in {}",
            inv.command.name()
        ));
        first
    } else {
        initial as usize
    };
    let spring_return = match inv.arg(3) {
        None => false,
        Some(s) => parse_bool(s).unwrap_or_else(|| {
            invalid(ctx, inv, "SpringReturn");
            false
        }),
    };
    let trailing = inv.command == TrackCommand::SwitchT;
    let switch = SwitchDef {
        second_rail: second,
        initial_setting: initial,
        trailing,
        spring_return,
        fixed_route: false,
        name: inv.arg(4).map(str::to_string),
        track_names: [inv.arg(5).map(str::to_string), inv.arg(6).map(str::to_string)],
    };
    ctx.block().switches.insert(first, switch);
    mark_driveable(ctx, first, trailing);
    mark_driveable(ctx, second, trailing);
}

/// `PlayerPath`: a fixed route through a junction the player always takes.
pub(super) fn player_path(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(first) = required_rail(ctx, inv, 0, "RailIndex1") else {
        return;
    };
    let Some(second) = required_rail(ctx, inv, 1, "RailIndex2") else {
        return;
    };
    mark_driveable(ctx, first, false);
    mark_driveable(ctx, second, false);
    let switch = SwitchDef {
        second_rail: second,
        initial_setting: second,
        trailing: false,
        spring_return: false,
        fixed_route: true,
        name: inv.arg(2).map(str::to_string),
        track_names: [None, None],
    };
    ctx.block().switches.insert(first, switch);
}

/// Rail index for the `Rail*` family. Missing counts as malformed.
fn explicit_rail(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> Option<usize> {
    match inv.int(0) {
        Parsed::Value(v) if v >= 0 => Some(v as usize),
        _ => {
            invalid(ctx, inv, "RailIndex");
            None
        }
    }
}

pub(super) fn rail_limit(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(rail) = explicit_rail(ctx, inv) else {
        return;
    };
    let limit = match inv.double(1) {
        Parsed::Value(v) => v,
        Parsed::Missing => 0.0,
        Parsed::Invalid => {
            invalid(ctx, inv, "Speed");
            return;
        }
    };
    let direction = ctx.int_or(inv, 2, "Direction", 0);
    let course = ctx.int_or(inv, 3, "Cource", 0);
    let speed = if limit <= 0.0 {
        f64::INFINITY
    } else {
        ctx.options.unit_of_speed * limit
    };
    let track_position = ctx.track_position();
    ctx.block().limits.push(LimitDef {
        track_position,
        speed,
        direction,
        course,
        rail,
    });
}

pub(super) fn rail_buffer(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(rail) = explicit_rail(ctx, inv) else {
        return;
    };
    let mut affects_ai = ctx.int_or(inv, 1, "AffectsAI", 0);
    if affects_ai != 0 && affects_ai != 1 {
        ctx.error(format!(
            "AffectsAI is expected to be 0 or 1 in {}",
            inv.command.name()
        ));
        affects_ai = 0;
    }
    let track_position = ctx.track_position();
    ctx.block().buffers.push(BufferStop {
        rail,
        track_position,
        affects_ai: affects_ai != 0,
    });
}

pub(super) fn rail_accuracy(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(rail) = explicit_rail(ctx, inv) else {
        return;
    };
    let acc = clamp_accuracy(ctx.double_or(inv, 1, "Value", 2.0));
    ctx.block().rails.get_or_insert_with(rail, Rail::default).accuracy = acc;
}

pub(super) fn rail_adhesion(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(rail) = explicit_rail(ctx, inv) else {
        return;
    };
    let a = adhesion_factor(ctx, inv, 1);
    ctx.block().rails.get_or_insert_with(rail, Rail::default).adhesion = a;
}

#[cfg(test)]
mod tests {
    use crate::block::RailCycle;
    use crate::catalog::{CatalogBuilder, StructureKind};
    use crate::test_utils::Harness;

    #[test]
    fn rail_start_sets_offsets_and_cant() {
        let mut h = Harness::new();
        h.run("Rail", &["1", "10", "0", "", "5"]);
        let rail = h.block(0).rails.get(1).unwrap();
        assert!(rail.started);
        assert_eq!(rail.start.x, 10.0);
        assert_eq!(rail.end.x, 10.0);
        assert!((rail.curve_cant - 0.005).abs() < 1e-12);
        assert!(h.diagnostics().is_empty());
    }

    #[test]
    fn rail_end_moves_end_only() {
        let mut h = Harness::new();
        h.run("Rail", &["1", "10", "0", "0", "5"]);
        h.run("RailEnd", &["1", "20"]);
        let rail = h.block(0).rails.get(1).unwrap();
        assert_eq!(rail.start.x, 10.0);
        assert_eq!(rail.end.x, 20.0);
        assert!(rail.ended && !rail.started);
    }

    #[test]
    fn rail_zero_is_rejected() {
        let mut h = Harness::new();
        h.run("Rail", &["0", "3"]);
        h.run("RailEnd", &["0"]);
        assert_eq!(h.error_count(), 2);
        assert_eq!(h.block(0).rails.get(0).unwrap().start.x, 0.0);
    }

    #[test]
    fn rail_end_of_unknown_rail_is_an_error() {
        let mut h = Harness::new();
        h.run("RailEnd", &["4"]);
        assert_eq!(h.error_count(), 1);
        assert!(!h.block(0).rails.contains(4));
    }

    #[test]
    fn restarting_in_same_block_ends_previous_segment() {
        let mut h = Harness::new();
        h.run("Rail", &["2", "1"]);
        h.run("Rail", &["2", "5"]);
        let rail = h.block(0).rails.get(2).unwrap();
        assert!(rail.ended);
        assert_eq!(rail.start.x, 5.0);
        assert_eq!(rail.end.x, 1.0);
    }

    #[test]
    fn referencing_rail_grows_per_rail_arrays() {
        let mut h = Harness::new();
        h.run("Rail", &["6", "2"]);
        let b = h.block(0);
        assert!(b.rail_types.len() >= 7);
        assert!(b.rail_cycles.len() >= 7);
        assert_eq!(b.rail_cycles[5], RailCycle::default());
    }

    #[test]
    fn rail_type_follows_cycles() {
        let mut cb = CatalogBuilder::new();
        cb.structures(StructureKind::Rail, [0, 1, 2, 3])
            .rail_cycle(3, vec![1, 2]);
        let mut h = Harness::with_catalog(cb.build());
        h.run("RailType", &["0", "3"]);
        assert_eq!(h.block(0).rail_types[0], 1);
        assert_eq!(h.block(0).rail_cycles[0].cycle, Some(3));
        h.run("RailType", &["0", "9"]);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn accuracy_defaults_and_clamps() {
        let mut h = Harness::new();
        h.run("Accuracy", &["7"]);
        assert_eq!(h.block(0).rails.get(0).unwrap().accuracy, 4.0);
        h.run("Accuracy", &[]);
        assert_eq!(h.block(0).rails.get(0).unwrap().accuracy, 2.0);
    }

    #[test]
    fn adhesion_rejects_negative() {
        let mut h = Harness::new();
        h.run("Adhesion", &["-5"]);
        assert_eq!(h.block(0).rails.get(0).unwrap().adhesion, 1.0);
        assert_eq!(h.error_count(), 1);
        h.run("Adhesion", &["85"]);
        assert!((h.block(0).rails.get(0).unwrap().adhesion - 0.85).abs() < 1e-12);
    }

    #[test]
    fn unsigned_cant_follows_radius_sign() {
        let mut h = Harness::new();
        h.run("Curve", &["-600", "105"]);
        let t = h.block(0).track;
        assert_eq!(t.curve_radius, -600.0);
        assert!((t.curve_cant + 0.105).abs() < 1e-12);
        h.run("Curve", &["0", "105"]);
        assert_eq!(h.block(0).track.curve_cant, 0.0);
    }

    #[test]
    fn signed_cant_keeps_straight_track_cant() {
        let mut h = Harness::with_options(|o| o.signed_cant = true);
        h.run("Curve", &["-600", "-105"]);
        assert!((h.block(0).track.curve_cant - 0.105).abs() < 1e-12);
        h.run("Curve", &["0", "-50"]);
        assert!((h.block(0).track.curve_cant + 0.05).abs() < 1e-12);
    }

    #[test]
    fn switch_marks_rails_driveable_back_to_segment_start() {
        let mut h = Harness::new();
        h.run("Rail", &["1", "4"]);
        h.at(50.0);
        h.run("Switch", &["0", "1"]);
        let sw = h.block(2).switches.get(0).unwrap();
        assert_eq!(sw.second_rail, 1);
        assert_eq!(sw.initial_setting, 0);
        assert!(!sw.trailing);
        assert!(h.block(2).rails.get(1).unwrap().driveable);
        assert!(h.block(1).rails.get(1).unwrap().driveable);
    }

    #[test]
    fn switch_rejects_malformed_indices() {
        let mut h = Harness::new();
        h.run("Switch", &["x", "1"]);
        h.run("SwitchT", &["0", "-1"]);
        h.run("Switch", &["0", "1", "0", "maybe"]);
        assert_eq!(h.error_count(), 3);
        let sw = h.block(0).switches.get(0).unwrap();
        assert!(!sw.spring_return);
    }

    #[test]
    fn player_path_is_fixed() {
        let mut h = Harness::new();
        h.run("PlayerPath", &["0", "2", "Junction"]);
        let sw = h.block(0).switches.get(0).unwrap();
        assert!(sw.fixed_route);
        assert_eq!(sw.initial_setting, 2);
        assert_eq!(sw.name.as_deref(), Some("Junction"));
    }

    #[test]
    fn rail_limit_needs_rail_index() {
        let mut h = Harness::new();
        h.run("RailLimit", &[]);
        h.run("RailLimit", &["1", "80", "1"]);
        assert_eq!(h.error_count(), 1);
        let l = h.block(0).limits[0];
        assert_eq!(l.rail, 1);
        assert_eq!(l.direction, 1);
        assert!((l.speed - 80.0 / 3.6).abs() < 1e-9);
    }

    #[test]
    fn rail_buffer_and_rail_adhesion() {
        let mut h = Harness::new();
        h.run("RailBuffer", &["2", "5"]);
        assert!(!h.block(0).buffers[0].affects_ai);
        h.run("RailAdhesion", &["3", "50"]);
        h.run("RailAccuracy", &["3", "1"]);
        let r = h.block(0).rails.get(3).unwrap();
        assert_eq!(r.adhesion, 0.5);
        assert_eq!(r.accuracy, 1.0);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn height_is_block_local() {
        let mut h = Harness::with_options(|o| o.is_rw = true);
        h.at(25.0);
        h.run("Height", &["2"]);
        assert!((h.block(1).height.unwrap() - 2.3).abs() < 1e-12);
    }
}
