//! Platforms, poles, walls, ground and free-standing objects.

use super::{invalid, warn_unstarted};
use crate::block::{Crack, Direction, Form, FormTarget, FreeObject, PatternObject, Pole, Slots, WallDike};
use crate::catalog::StructureKind;
use crate::command::{Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// Pattern repetition used when the interval cannot be read.
const DEFAULT_PATTERN_INTERVAL: f64 = 25.0;

/// Second rail of a `Form`. `L` and `R` (or `-1` and `-2`) address the
/// platform edges; the RW dialect uses `-9` and `9` for the same purpose and
/// `9X` for rail 9.
fn form_target(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> Option<FormTarget> {
    let is_rw = ctx.options.is_rw;
    let raw = match inv.arg(1) {
        None => 0,
        Some(s) if s.eq_ignore_ascii_case("L") => -1,
        Some(s) if s.eq_ignore_ascii_case("R") => -2,
        Some(s) if is_rw && s.eq_ignore_ascii_case("9X") => return Some(FormTarget::Rail(9)),
        Some(_) => ctx.int_or(inv, 1, "RailIndex2", 0),
    };
    match raw {
        -9 if is_rw => Some(FormTarget::Left),
        9 if is_rw => Some(FormTarget::Right),
        -1 => Some(FormTarget::Left),
        -2 => Some(FormTarget::Right),
        r if r < 0 => None,
        r => Some(FormTarget::Rail(r as usize)),
    }
}

/// `Form`: a platform between a rail and a second rail or edge.
pub(super) fn form(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let primary = ctx.int_or(inv, 0, "RailIndex1", 0);
    let secondary = form_target(ctx, inv);
    if primary < 0 {
        ctx.error(format!(
            "RailIndex1 is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let Some(secondary) = secondary else {
        ctx.error(format!(
            "RailIndex2 is expected to be greater or equal to -2 in {}",
            inv.command.name()
        ));
        return;
    };
    let primary = primary as usize;
    if !ctx.block_ref().rail_started(primary) {
        ctx.warning(format!("RailIndex1 could be out of range in {}", inv.command.name()));
    }
    // rail 0 as the second target is a stub platform
    if let FormTarget::Rail(r) = secondary {
        if r != 0 && !ctx.block_ref().rail_started(r) {
            ctx.warning(format!("RailIndex2 could be out of range in {}", inv.command.name()));
        }
    }

    let roof = ctx.int_or(inv, 2, "RoofStructureIndex", 0);
    let pf = ctx.int_or(inv, 3, "FormStructureIndex", 0);
    let catalog = ctx.catalog;
    if roof != 0
        && (roof < 0
            || (!catalog.has(StructureKind::RoofL, roof as usize)
                && !catalog.has(StructureKind::RoofR, roof as usize)))
    {
        ctx.error(format!(
            "RoofStructureIndex {roof} references an object not loaded in {}",
            inv.command.name()
        ));
    }
    if pf < 0
        || (!catalog.has(StructureKind::FormL, pf as usize)
            && !catalog.has(StructureKind::FormR, pf as usize))
    {
        ctx.error(format!(
            "FormStructureIndex {pf} references an object not loaded in {}",
            inv.command.name()
        ));
    }
    if roof < 0 || pf < 0 {
        return;
    }
    // unloaded parts are still recorded; the builder skips them
    ctx.block().forms.push(Form {
        primary,
        secondary,
        form_kind: pf as usize,
        roof_kind: roof as usize,
    });
}

/// `Pole`: starts or updates the overhead-line poles along a rail.
pub(super) fn pole(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    if idx < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    warn_unstarted(ctx, inv, idx);

    let interval = ctx.block_interval();
    {
        let poles = &mut ctx.block().poles;
        if poles.len() <= idx {
            poles.resize(idx + 1, Pole::new(interval));
        }
    }
    let current = ctx.block_ref().poles[idx];
    let typ = ctx.int_or(inv, 1, "AdditionalRailsCovered", current.mode as i32);
    let location = match inv.double(2) {
        Parsed::Value(v) => Some(v),
        Parsed::Missing => None,
        Parsed::Invalid => {
            invalid(ctx, inv, "Location");
            Some(0.0)
        }
    };
    let spacing = match inv.length(3, ctx.unit_of_length()) {
        Parsed::Value(v) => Some(v),
        Parsed::Missing => None,
        Parsed::Invalid => {
            invalid(ctx, inv, "Interval");
            Some(interval)
        }
    };
    let sttype = ctx.int_or(inv, 4, "PoleStructureIndex", current.kind as i32);

    {
        let pole = &mut ctx.block().poles[idx];
        if let Some(location) = location {
            pole.location = location;
        }
        if let Some(spacing) = spacing {
            pole.interval = spacing;
        }
    }

    if typ < 0 || !ctx.catalog.has_pole_set(typ as usize) {
        ctx.error(format!(
            "AdditionalRailsCovered {typ} references a pole set not loaded in {}",
            inv.command.name()
        ));
    } else if sttype < 0 || !ctx.catalog.has_pole(typ as usize, sttype as usize) {
        ctx.error(format!(
            "PoleStructureIndex {sttype} references an object not loaded in {}",
            inv.command.name()
        ));
    } else {
        let pole = &mut ctx.block().poles[idx];
        pole.mode = typ as usize;
        pole.kind = sttype as usize;
        pole.exists = true;
    }
}

pub(super) fn pole_end(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    if idx < 0 || idx as usize >= ctx.block_ref().poles.len() {
        ctx.error(format!(
            "RailIndex {idx} does not reference an existing pole in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    let block = ctx.block_ref();
    let active = block.rails.get(idx).is_some_and(|r| r.started || r.ended);
    if !active {
        ctx.warning(format!(
            "RailIndex {idx} could be out of range in {}",
            inv.command.name()
        ));
    }
    ctx.block().poles[idx].exists = false;
}

fn wall_kinds(command: TrackCommand) -> (StructureKind, StructureKind) {
    match command {
        TrackCommand::Dike | TrackCommand::DikeEnd => (StructureKind::DikeL, StructureKind::DikeR),
        _ => (StructureKind::WallL, StructureKind::WallR),
    }
}

fn wall_slots<'c>(ctx: &'c mut ParseContext<'_>, command: TrackCommand) -> &'c mut Slots<WallDike> {
    let block = ctx.block();
    match command {
        TrackCommand::Dike | TrackCommand::DikeEnd => &mut block.dikes,
        _ => &mut block.walls,
    }
}

/// `Wall` / `Dike`: a continuous side structure along a rail.
pub(super) fn wall_or_dike(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    if idx < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    let direction = match inv.arg(1).map(|s| Direction::parse(s, true)) {
        None => return,
        Some(None) => {
            invalid(ctx, inv, "Direction");
            return;
        }
        Some(Some(Direction::None)) => return,
        Some(Some(d)) => d,
    };
    let sttype = ctx.int_or(inv, 2, "StructureIndex", 0);
    if sttype < 0 {
        ctx.error(format!(
            "StructureIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let sttype = sttype as usize;

    let (left_kind, right_kind) = wall_kinds(inv.command);
    let left = ctx.catalog.has(left_kind, sttype);
    let right = ctx.catalog.has(right_kind, sttype);
    let direction = match direction {
        Direction::Left if left => Direction::Left,
        Direction::Right if right => Direction::Right,
        Direction::Both if left && right => Direction::Both,
        Direction::Both if left || right => {
            let missing = if left { "right" } else { "left" };
            ctx.error(format!(
                "StructureIndex {sttype} has no {missing} object in {}",
                inv.command.name()
            ));
            if left { Direction::Left } else { Direction::Right }
        }
        _ => {
            ctx.error(format!(
                "StructureIndex {sttype} references an object not loaded in {}",
                inv.command.name()
            ));
            return;
        }
    };
    warn_unstarted(ctx, inv, idx);
    let command = inv.command;
    wall_slots(ctx, command).insert(
        idx,
        WallDike {
            exists: true,
            kind: sttype,
            direction,
        },
    );
}

pub(super) fn wall_or_dike_end(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    let command = inv.command;
    let present = idx >= 0 && wall_slots(ctx, command).contains(idx as usize);
    if !present {
        ctx.error(format!(
            "RailIndex {idx} does not reference an existing structure in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = idx as usize;
    let active = ctx
        .block_ref()
        .rails
        .get(idx)
        .is_some_and(|r| r.started || r.ended);
    if !active {
        ctx.warning(format!(
            "RailIndex {idx} could be out of range in {}",
            inv.command.name()
        ));
    }
    if let Some(w) = wall_slots(ctx, command).get_mut(idx) {
        w.exists = false;
    }
}

/// `Ground`: a ground cycle, or a single ground object repeated every block.
pub(super) fn ground(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let index = ctx.int_or(inv, 0, "CycleIndex", 0);
    let cycle = if index < 0 {
        None
    } else if let Some(cycle) = ctx.catalog.ground_cycle(index as usize) {
        Some(cycle.to_vec())
    } else if ctx.catalog.has(StructureKind::Ground, index as usize) {
        Some(vec![index as usize])
    } else {
        None
    };
    match cycle {
        Some(cycle) => ctx.block().ground_cycle = cycle,
        None => ctx.error(format!(
            "CycleIndex {index} references an object not loaded in {}",
            inv.command.name()
        )),
    }
}

/// `Crack`: a deformable fill between two rails.
pub(super) fn crack(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let idx1 = ctx.int_or(inv, 0, "RailIndex1", 0);
    let idx2 = ctx.int_or(inv, 1, "RailIndex2", 0);
    let sttype = ctx.int_or(inv, 2, "CrackStructureIndex", 0);
    let loaded = sttype >= 0
        && ctx.catalog.has(StructureKind::CrackL, sttype as usize)
        && ctx.catalog.has(StructureKind::CrackR, sttype as usize);
    if !loaded {
        ctx.error(format!(
            "CrackStructureIndex {sttype} references an object not loaded in {}",
            inv.command.name()
        ));
        return;
    }
    if idx1 < 0 || idx2 < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    if idx1 == idx2 {
        ctx.error(format!(
            "RailIndex1 is expected to be unequal to RailIndex2 in {}",
            inv.command.name()
        ));
        return;
    }
    let (primary, secondary) = (idx1 as usize, idx2 as usize);
    warn_unstarted(ctx, inv, primary);
    warn_unstarted(ctx, inv, secondary);
    ctx.block().cracks.push(Crack {
        primary,
        secondary,
        kind: sttype as usize,
    });
}

/// `FreeObj`: a one-off object placed relative to a rail, or to the ground
/// when the rail index is `-1`.
pub(super) fn free_obj(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.len() < 2 {
        ctx.error(format!(
            "An insufficient number of arguments was supplied in {}",
            inv.command.name()
        ));
        return;
    }
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    let sttype = ctx.int_or(inv, 1, "FreeObjStructureIndex", 0);
    if idx < -1 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative or -1 in {}",
            inv.command.name()
        ));
        return;
    }
    if sttype < 0 {
        ctx.error(format!(
            "FreeObjStructureIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    if idx >= 0 {
        warn_unstarted(ctx, inv, idx as usize);
    }
    if !ctx.catalog.has_free_object(sttype as usize) {
        ctx.error(format!(
            "FreeObjStructureIndex {sttype} references an object not loaded in {}",
            inv.command.name()
        ));
        return;
    }
    let x = ctx.length_or(inv, 2, "X", 0.0);
    let y = ctx.length_or(inv, 3, "Y", 0.0);
    let (yaw, mut pitch, mut roll) = ctx.orientation(inv, 4);
    if ctx.options.ignore_pitch_roll {
        pitch = 0.0;
        roll = 0.0;
    }
    let object = FreeObject {
        track_position: ctx.track_position(),
        kind: sttype as usize,
        position: Vector2::new(x, y),
        yaw,
        pitch,
        roll,
    };
    let block = ctx.block();
    if idx == -1 {
        block.ground_free_objects.push(object);
    } else {
        block
            .rail_free_objects
            .get_or_insert_with(idx as usize, Vec::new)
            .push(object);
    }
}

/// `Back` / `Background`.
pub(super) fn background(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let typ = ctx.int_or(inv, 0, "BackgroundIndex", 0);
    if typ < 0 || !ctx.catalog.has(StructureKind::Background, typ as usize) {
        ctx.error(format!(
            "BackgroundIndex {typ} references a background not loaded in {}",
            inv.command.name()
        ));
        return;
    }
    let typ = typ as usize;
    ctx.block().background = Some(typ);
    // Block 0 always starts on background 0; routes that never load it
    // expect their first background from the start.
    if ctx.options.enable_hacks
        && ctx.data.blocks.len() == 2
        && ctx.data.blocks[0].background == Some(0)
        && !ctx.catalog.has(StructureKind::Background, 0)
    {
        ctx.data.blocks[0].background = Some(typ);
    }
}

fn pattern_index(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> Option<i32> {
    match inv.int(0) {
        Parsed::Value(v) => Some(v),
        Parsed::Missing => Some(-1),
        Parsed::Invalid => {
            invalid(ctx, inv, "Index");
            None
        }
    }
}

/// `PatternObj`: repeats a sequence of free objects at a fixed interval
/// until `PatternEnd`.
pub(super) fn pattern_obj(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    ctx.warning(format!(
        "{} is only supported for Hmmsim routes",
        inv.command.name()
    ));
    let Some(idx) = pattern_index(ctx, inv) else {
        return;
    };
    let rail = inv.indices[0].unwrap_or(0).max(0) as usize;
    let mut pattern = ctx
        .block_ref()
        .pattern_objects
        .get(&idx)
        .cloned()
        .unwrap_or(PatternObject {
            rail,
            interval: 0.0,
            position: Vector2::ZERO,
            types: Vec::new(),
            last_placement: 0.0,
            ends: false,
        });

    match inv.double(1) {
        Parsed::Value(v) => pattern.interval = v,
        Parsed::Missing => {}
        Parsed::Invalid => {
            invalid(ctx, inv, "Repetition interval");
            pattern.interval = DEFAULT_PATTERN_INTERVAL;
        }
    }
    if pattern.interval <= 0.0 {
        ctx.error(format!(
            "Repetition interval must be non-zero in {}",
            inv.command.name()
        ));
        match inv.double(2) {
            Parsed::Value(v) => pattern.interval = v,
            Parsed::Missing => {}
            Parsed::Invalid => {
                invalid(ctx, inv, "Repetition interval");
                pattern.interval = DEFAULT_PATTERN_INTERVAL;
            }
        }
    }
    match inv.double(3) {
        Parsed::Value(v) => pattern.position.x = v,
        Parsed::Missing => {}
        Parsed::Invalid => invalid(ctx, inv, "X position"),
    }
    match inv.double(4) {
        Parsed::Value(v) => pattern.position.y = v,
        Parsed::Missing => {}
        Parsed::Invalid => invalid(ctx, inv, "Y position"),
    }

    pattern.types.clear();
    for i in 6..inv.args.len() {
        match inv.int(i).value() {
            Some(t) => pattern.types.push(t),
            None => {
                invalid(ctx, inv, "ObjectIndex");
                break;
            }
        }
    }
    pattern.last_placement = ctx.track_position();
    ctx.block().pattern_objects.insert(idx, pattern);
}

pub(super) fn pattern_end(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    ctx.warning(format!(
        "{} is only supported for Hmmsim routes",
        inv.command.name()
    ));
    let Some(idx) = pattern_index(ctx, inv) else {
        return;
    };
    if let Some(pattern) = ctx.block().pattern_objects.get_mut(&idx) {
        pattern.ends = true;
    } else {
        ctx.warning(format!(
            "Attempted to stop the non-existent pattern with index {idx} in {}",
            inv.command.name()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogBuilder;
    use crate::test_utils::{Harness, sample_catalog_builder};

    #[test]
    fn form_edges_and_stub() {
        let mut h = Harness::new();
        h.run("Rail", &["1", "4"]);
        h.run("Form", &["0", "L", "1", "1"]);
        h.run("Form", &["0", "-2"]);
        h.run("Form", &["0", "1", "", "0"]);
        h.run("Form", &["1", "0"]);
        let f = &h.block(0).forms;
        assert_eq!(f[0].secondary, FormTarget::Left);
        assert_eq!(f[0].roof_kind, 1);
        assert_eq!(f[1].secondary, FormTarget::Right);
        assert_eq!(f[2].secondary, FormTarget::Rail(1));
        assert_eq!(f[3].secondary, FormTarget::Rail(0));
        assert!(h.diagnostics().is_empty());
    }

    #[test]
    fn rw_form_uses_nine_for_edges() {
        let mut h = Harness::with_options(|o| o.is_rw = true);
        h.run("Form", &["0", "-9"]);
        h.run("Form", &["0", "9"]);
        h.run("Form", &["0", "9X"]);
        let f = &h.block(0).forms;
        assert_eq!(f[0].secondary, FormTarget::Left);
        assert_eq!(f[1].secondary, FormTarget::Right);
        assert_eq!(f[2].secondary, FormTarget::Rail(9));
        assert_eq!(h.warning_count(), 1);
    }

    #[test]
    fn form_with_unknown_structures_is_still_recorded() {
        let mut h = Harness::new();
        h.run("Form", &["0", "L", "7", "8"]);
        assert_eq!(h.error_count(), 2);
        assert_eq!(h.block(0).forms.len(), 1);
        h.run("Form", &["-1", "L"]);
        h.run("Form", &["0", "-3"]);
        assert_eq!(h.error_count(), 4);
        assert_eq!(h.block(0).forms.len(), 1);
        h.run("Form", &["0", "L", "-1", "0"]);
        h.run("Form", &["0", "L", "0", "-4"]);
        assert_eq!(h.error_count(), 6);
        assert_eq!(h.block(0).forms.len(), 1);
    }

    #[test]
    fn pole_defaults_and_updates() {
        let mut h = Harness::new();
        h.run("Pole", &["0"]);
        let p = h.block(0).poles[0];
        assert!(p.exists);
        assert_eq!(p.interval, 50.0);
        h.run("Pole", &["0", "1", "-1", "75"]);
        let p = h.block(0).poles[0];
        assert_eq!(p.mode, 1);
        assert_eq!(p.location, -1.0);
        assert_eq!(p.interval, 75.0);
        h.at(30.0);
        assert!(h.block(1).poles[0].exists);
        assert!(h.diagnostics().is_empty());
    }

    #[test]
    fn pole_rejects_unknown_sets() {
        let mut h = Harness::new();
        h.run("Pole", &["0", "9"]);
        h.run("Pole", &["0", "0", "", "", "4"]);
        h.run("Pole", &["-1"]);
        assert_eq!(h.error_count(), 3);
        assert!(!h.block(0).poles[0].exists);
    }

    #[test]
    fn pole_end_stops_poles() {
        let mut h = Harness::new();
        h.run("PoleEnd", &["0"]);
        assert_eq!(h.error_count(), 1);
        h.run("Pole", &["0"]);
        h.at(25.0);
        h.run("PoleEnd", &["0"]);
        assert!(h.block(0).poles[0].exists);
        assert!(!h.block(1).poles[0].exists);
    }

    #[test]
    fn wall_both_sides_downgrades_to_loaded_side() {
        let mut h = Harness::new();
        h.run("Wall", &["0", "0", "2"]);
        let w = h.block(0).walls.get(0).unwrap();
        assert_eq!(w.direction, Direction::Left);
        assert_eq!(h.error_count(), 1);
        h.run("Dike", &["0", "R", "1"]);
        assert_eq!(h.block(0).dikes.get(0).unwrap().direction, Direction::Right);
    }

    #[test]
    fn wall_without_direction_is_ignored() {
        let mut h = Harness::new();
        h.run("Wall", &["0"]);
        h.run("Wall", &["0", "N"]);
        h.run("Wall", &["0", "up"]);
        h.run("Wall", &["0", "L", "9"]);
        assert!(h.block(0).walls.is_empty());
        assert_eq!(h.error_count(), 2);
    }

    #[test]
    fn wall_with_negative_index_is_skipped() {
        let mut h = Harness::new();
        h.run("Wall", &["-1", "-1", "0"]);
        h.run("Dike", &["0", "-1", "-5"]);
        assert_eq!(h.error_count(), 2);
        assert!(h.block(0).walls.is_empty());
        assert!(h.block(0).dikes.is_empty());
    }

    #[test]
    fn wall_end_needs_existing_wall() {
        let mut h = Harness::new();
        h.run("WallEnd", &["0"]);
        assert_eq!(h.error_count(), 1);
        h.run("Wall", &["0", "B", "0"]);
        h.run("DikeEnd", &["0"]);
        assert_eq!(h.error_count(), 2);
        h.run("WallEnd", &["0"]);
        assert!(!h.block(0).walls.get(0).unwrap().exists);
    }

    #[test]
    fn ground_prefers_cycles() {
        let mut cb = sample_catalog_builder();
        cb.ground_cycle(1, vec![2, 3]);
        let mut h = Harness::with_catalog(cb.build());
        h.run("Ground", &["1"]);
        assert_eq!(h.block(0).ground_cycle, vec![2, 3]);
        h.run("Ground", &["3"]);
        assert_eq!(h.block(0).ground_cycle, vec![3]);
        h.run("Ground", &["40"]);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn crack_checks_rails_and_structure() {
        let mut h = Harness::new();
        h.run("Rail", &["1", "3"]);
        h.run("Crack", &["0", "1", "0"]);
        h.run("Crack", &["0", "0", "0"]);
        h.run("Crack", &["0", "-1", "0"]);
        h.run("Crack", &["0", "1", "1"]);
        assert_eq!(h.block(0).cracks.len(), 1);
        assert_eq!(h.error_count(), 3);
    }

    #[test]
    fn free_obj_targets_rail_or_ground() {
        let mut h = Harness::new();
        h.run("FreeObj", &["0", "2", "1.5", "0", "90"]);
        h.run("FreeObj", &["-1", "3"]);
        h.run("FreeObj", &["0"]);
        let b = h.block(0);
        let obj = &b.rail_free_objects.get(0).unwrap()[0];
        assert_eq!(obj.kind, 2);
        assert_eq!(obj.position.x, 1.5);
        assert!((obj.yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(b.ground_free_objects[0].kind, 3);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn free_obj_can_drop_pitch_and_roll() {
        let mut h = Harness::with_options(|o| o.ignore_pitch_roll = true);
        h.run("FreeObj", &["0", "1", "0", "0", "10", "20", "30"]);
        let obj = &h.block(0).rail_free_objects.get(0).unwrap()[0];
        assert!(obj.yaw > 0.0);
        assert_eq!((obj.pitch, obj.roll), (0.0, 0.0));
    }

    #[test]
    fn free_obj_rejects_unknown_objects() {
        let mut h = Harness::new();
        h.run("FreeObj", &["-2", "1"]);
        h.run("FreeObj", &["0", "-1"]);
        h.run("FreeObj", &["0", "99"]);
        assert_eq!(h.error_count(), 3);
        assert!(h.block(0).rail_free_objects.is_empty());
    }

    #[test]
    fn background_switches_per_block() {
        let mut h = Harness::new();
        h.at(25.0);
        h.run("Back", &["2"]);
        h.run("Background", &["7"]);
        assert_eq!(h.block(1).background, Some(2));
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn background_hack_replaces_unloaded_initial_background() {
        let mut cb = CatalogBuilder::new();
        cb.structure(StructureKind::Background, 4);
        let mut h = Harness::with_catalog(cb.build());
        h.set_options(|o| o.enable_hacks = true);
        h.at(25.0);
        h.run("Background", &["4"]);
        assert_eq!(h.block(0).background, Some(4));
    }

    #[test]
    fn pattern_obj_and_end() {
        let mut h = Harness::new();
        h.at(10.0);
        h.run("PatternObj", &["3", "5", "", "1", "2", "", "4", "6", "x", "7"]);
        let p = &h.block(0).pattern_objects[&3];
        assert_eq!(p.interval, 5.0);
        assert_eq!(p.position, Vector2::new(1.0, 2.0));
        assert_eq!(p.types, vec![4, 6]);
        assert_eq!(p.last_placement, 10.0);
        h.run("PatternEnd", &["3"]);
        assert!(h.block(0).pattern_objects[&3].ends);
        h.at(30.0);
        assert!(h.block(1).pattern_objects.is_empty());
    }

    #[test]
    fn pattern_interval_falls_back() {
        let mut h = Harness::new();
        h.run("PatternObj", &["0", "0", "12"]);
        assert_eq!(h.block(0).pattern_objects[&0].interval, 12.0);
        h.run("PatternObj", &["1", "abc"]);
        assert_eq!(h.block(0).pattern_objects[&1].interval, DEFAULT_PATTERN_INTERVAL);
        h.run("PatternEnd", &["5"]);
        assert_eq!(h.error_count(), 2);
        assert_eq!(h.warning_count(), 4);
    }
}
