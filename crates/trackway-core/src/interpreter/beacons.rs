//! Beacons, transponders and destination changes.

use crate::block::{DestinationDef, NO_BEACON_OBJECT, TransponderDef, transponder_kind};
use crate::command::Invocation;
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// Validates a beacon structure reference. `-1` means no object; anything
/// else must be a loaded beacon.
pub(super) fn beacon_structure(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, structure: i32) -> i32 {
    if structure < -1 {
        ctx.error(format!(
            "BeaconStructureIndex is expected to be non-negative or -1 in {}",
            inv.command.name()
        ));
        -1
    } else if structure >= 0 && !ctx.catalog.has_beacon(structure as usize) {
        ctx.error(format!(
            "BeaconStructureIndex {structure} references an object not loaded in {}",
            inv.command.name()
        ));
        -1
    } else {
        structure
    }
}

/// Trigger-once flag shared by `Destination` and `HornBlow`.
pub(super) fn trigger_once(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, value: i32) -> bool {
    if !(0..=1).contains(&value) {
        ctx.error(format!(
            "TriggerOnce is expected to be 0 or 1 in {}",
            inv.command.name()
        ));
        return false;
    }
    value == 1
}

/// `Beacon`: a transponder with an optional visible object.
pub(super) fn beacon(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let kind = ctx.int_or(inv, 0, "Type", 0);
    if kind < 0 {
        ctx.error(format!(
            "Type is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let structure = ctx.int_or(inv, 1, "BeaconStructureIndex", 0);
    let section = ctx.int_or(inv, 2, "Section", 0);
    let data = ctx.int_or(inv, 3, "Data", 0);
    let structure = beacon_structure(ctx, inv, structure);
    let section = match section {
        // next red section, resolved by the builder
        -1 => -1,
        s if s < 0 => {
            ctx.error(format!(
                "Section is expected to be non-negative or -1 in {}",
                inv.command.name()
            ));
            ctx.current_section + 1
        }
        s => s + ctx.current_section,
    };
    let x = ctx.length_or(inv, 4, "X", 0.0);
    let y = ctx.length_or(inv, 5, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 6);
    let transponder = TransponderDef {
        track_position: ctx.track_position(),
        kind,
        data,
        position: Vector2::new(x, y),
        section,
        beacon_object: structure,
        clip_to_first_red_section: false,
        yaw,
        pitch,
        roll,
    };
    ctx.block().transponders.push(transponder);
}

/// `Transponder` / `Tr`: an object-less transponder clipped to the first
/// red section ahead.
pub(super) fn transponder(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let kind = ctx.int_or(inv, 0, "Type", 0);
    let mut signals = ctx.int_or(inv, 1, "Signals", 0);
    let work = ctx.int_or(inv, 2, "SwitchSystems", 0);
    if signals < 0 {
        ctx.error(format!(
            "Signals is expected to be non-negative in {}",
            inv.command.name()
        ));
        signals = 0;
    }
    let x = ctx.length_or(inv, 3, "X", 0.0);
    let y = ctx.length_or(inv, 4, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 5);
    let transponder = TransponderDef {
        track_position: ctx.track_position(),
        kind,
        data: work,
        position: Vector2::new(x, y),
        section: ctx.current_section + signals + 1,
        beacon_object: NO_BEACON_OBJECT,
        clip_to_first_red_section: true,
        yaw,
        pitch,
        roll,
    };
    ctx.block().transponders.push(transponder);
}

pub(super) fn ats_sn(ctx: &mut ParseContext<'_>, _inv: &Invocation<'_>) {
    let t = TransponderDef::bare(
        ctx.track_position(),
        transponder_kind::ATS_SN,
        0,
        ctx.current_section + 1,
    );
    ctx.block().transponders.push(t);
}

pub(super) fn ats_p(ctx: &mut ParseContext<'_>, _inv: &Invocation<'_>) {
    let t = TransponderDef::bare(
        ctx.track_position(),
        transponder_kind::ATS_P_RENEWAL,
        0,
        ctx.current_section + 1,
    );
    ctx.block().transponders.push(t);
}

/// Speed-limit payload in km/h, `i32::MAX` meaning no limit.
fn pattern_speed(speed: f64, unit_of_speed: f64) -> i32 {
    if speed == 0.0 {
        i32::MAX
    } else {
        (speed * unit_of_speed * 3.6).round_ties_even() as i32
    }
}

/// Section value for transponders attached to no section in particular.
const UNBOUND_SECTION: i32 = -1;

/// `Pattern`: a temporary (type 0) or permanent speed-limit pattern.
pub(super) fn pattern(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let kind = ctx.int_or(inv, 0, "Type", 0);
    let speed = ctx.double_or(inv, 1, "Speed", 0.0);
    let kind = if kind == 0 {
        transponder_kind::ATS_P_TEMPORARY_SPEED_LIMIT
    } else {
        transponder_kind::ATS_P_PERMANENT_SPEED_LIMIT
    };
    let data = pattern_speed(speed, ctx.options.unit_of_speed);
    let t = TransponderDef::bare(ctx.track_position(), kind, data, UNBOUND_SECTION);
    ctx.block().transponders.push(t);
}

pub(super) fn p_limit(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let speed = ctx.double_or(inv, 0, "Speed", 0.0);
    let data = pattern_speed(speed, ctx.options.unit_of_speed);
    let t = TransponderDef::bare(
        ctx.track_position(),
        transponder_kind::ATS_P_PERMANENT_SPEED_LIMIT,
        data,
        UNBOUND_SECTION,
    );
    ctx.block().transponders.push(t);
}

/// `Destination`: changes the train's destination when passed.
pub(super) fn destination(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let kind = ctx.int_or(inv, 0, "Type", 0);
    if !(-1..=1).contains(&kind) {
        ctx.error(format!(
            "Type is expected to be in the range of -1 to 1 in {}",
            inv.command.name()
        ));
        return;
    }
    let structure = ctx.int_or(inv, 1, "BeaconStructureIndex", 0);
    let next = ctx.int_or(inv, 2, "NextDestination", 0);
    let mut previous = ctx.int_or(inv, 3, "PreviousDestination", 0);
    let once = match inv.int(4) {
        Parsed::Value(v) => v,
        Parsed::Missing => 0,
        Parsed::Invalid => {
            ctx.error(format!("TriggerOnce is invalid in {}", inv.command.name()));
            // a malformed trigger flag discards the previous destination
            previous = 0;
            0
        }
    };
    let structure = beacon_structure(ctx, inv, structure);
    let trigger_once = trigger_once(ctx, inv, once);
    let x = ctx.length_or(inv, 5, "X", 0.0);
    let y = ctx.length_or(inv, 6, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 7);
    let destination = DestinationDef {
        track_position: ctx.track_position(),
        kind,
        trigger_once,
        beacon_object: structure,
        next,
        previous,
        position: Vector2::new(x, y),
        yaw,
        pitch,
        roll,
    };
    ctx.block().destinations.push(destination);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[test]
    fn beacon_section_is_relative() {
        let mut h = Harness::new();
        h.run("Section", &["0", "2"]);
        h.run("Beacon", &["44", "0", "1", "7", "1.5"]);
        h.run("Beacon", &["44", "-1", "-1"]);
        let t = &h.block(0).transponders;
        assert_eq!(t[0].section, 2);
        assert_eq!(t[0].data, 7);
        assert_eq!(t[0].beacon_object, 0);
        assert_eq!(t[0].position.x, 1.5);
        assert_eq!(t[1].section, -1);
        assert_eq!(t[1].beacon_object, -1);
        assert!(h.diagnostics().is_empty());
    }

    #[test]
    fn beacon_rejects_bad_references() {
        let mut h = Harness::new();
        h.run("Beacon", &["-1"]);
        h.run("Beacon", &["1", "50", "-4"]);
        assert_eq!(h.error_count(), 3);
        let t = &h.block(0).transponders;
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].beacon_object, -1);
        assert_eq!(t[0].section, 1);
    }

    #[test]
    fn transponder_targets_sections_ahead() {
        let mut h = Harness::new();
        h.run("Tr", &["1", "2", "3"]);
        h.run("Transponder", &["0", "-1"]);
        let t = &h.block(0).transponders;
        assert_eq!(t[0].section, 3);
        assert_eq!(t[0].data, 3);
        assert!(t[0].clip_to_first_red_section);
        assert_eq!(t[0].beacon_object, NO_BEACON_OBJECT);
        assert_eq!(t[1].section, 1);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn ats_shortcuts() {
        let mut h = Harness::new();
        h.run("AtsSn", &[]);
        h.run("AtsP", &[]);
        let t = &h.block(0).transponders;
        assert_eq!(t[0].kind, transponder_kind::ATS_SN);
        assert_eq!(t[1].kind, transponder_kind::ATS_P_RENEWAL);
        assert_eq!(t[1].section, 1);
    }

    #[test]
    fn pattern_speed_in_kmh() {
        let mut h = Harness::new();
        h.run("Pattern", &["0", "45"]);
        h.run("Pattern", &["1"]);
        h.run("PLimit", &["90"]);
        let t = &h.block(0).transponders;
        assert_eq!(t[0].kind, transponder_kind::ATS_P_TEMPORARY_SPEED_LIMIT);
        assert_eq!(t[0].data, 45);
        assert_eq!(t[1].kind, transponder_kind::ATS_P_PERMANENT_SPEED_LIMIT);
        assert_eq!(t[1].data, i32::MAX);
        assert_eq!(t[2].data, 90);
    }

    #[test]
    fn destination_checks_type_and_trigger() {
        let mut h = Harness::new();
        h.run("Destination", &["2"]);
        h.run("Destination", &["1", "-1", "4", "3", "x"]);
        h.run("Destination", &["0", "", "", "", "5"]);
        assert_eq!(h.error_count(), 3);
        let d = &h.block(0).destinations;
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].next, 4);
        assert_eq!(d[0].previous, 0);
        assert!(!d[1].trigger_once);
    }
}
