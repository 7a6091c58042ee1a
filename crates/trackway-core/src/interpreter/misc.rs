//! Horn triggers, AI pre-train timing and electrification.

use super::beacons::{beacon_structure, trigger_once};
use super::{invalid, warn_unstarted};
use crate::block::{CurrentKind, HornBlowDef, HornKind, PowerSupply, PowerSupplyKind, PreTrainInstruction};
use crate::command::Invocation;
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// `HornBlow`: asks AI trains to sound their horn when passed.
pub(super) fn horn_blow(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let kind = match ctx.int_or(inv, 0, "HornType", 0) {
        0 => HornKind::Primary,
        1 => HornKind::Secondary,
        2 => HornKind::Music,
        _ => {
            ctx.error(format!(
                "HornType is expected to be in the range of 0 to 2 in {}",
                inv.command.name()
            ));
            return;
        }
    };
    let structure = ctx.int_or(inv, 1, "BeaconStructureIndex", 0);
    let once = ctx.int_or(inv, 2, "TriggerOnce", 0);
    let structure = beacon_structure(ctx, inv, structure);
    let trigger_once = trigger_once(ctx, inv, once);
    let x = ctx.length_or(inv, 3, "X", 0.0);
    let y = ctx.length_or(inv, 4, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 5);
    let horn = HornBlowDef {
        track_position: ctx.track_position(),
        kind,
        trigger_once,
        beacon_object: structure,
        position: Vector2::new(x, y),
        yaw,
        pitch,
        roll,
    };
    ctx.block().horn_blows.push(horn);
}

/// `PreTrain`: a time at which the imaginary preceding train passes the
/// current position.
pub(super) fn pre_train(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.is_empty() {
        ctx.error(format!(
            "{} is expected to have exactly 1 argument",
            inv.command.name()
        ));
        return;
    }
    let time = match inv.time(0) {
        Parsed::Value(t) => t,
        Parsed::Missing => 0.0,
        Parsed::Invalid => {
            invalid(ctx, inv, "Time");
            0.0
        }
    };
    if ctx.data.pretrain.last().is_some_and(|p| p.time >= time) {
        ctx.error(format!(
            "Time is expected to be in ascending order between successive {} commands",
            inv.command.name()
        ));
    }
    let track_position = ctx.track_position();
    ctx.data.pretrain.push(PreTrainInstruction {
        track_position,
        time,
    });
}

fn supply_kind(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> Option<PowerSupplyKind> {
    let text = inv.arg(1)?;
    match text.trim().to_ascii_uppercase().as_str() {
        "OHLE" | "1" => Some(PowerSupplyKind::OverheadLine),
        "THIRDRAIL" | "2" => Some(PowerSupplyKind::ThirdRail),
        "FOURTHRAIL" | "3" => Some(PowerSupplyKind::FourthRail),
        _ => {
            invalid(ctx, inv, "Type");
            None
        }
    }
}

/// Rail index for the power supply commands: malformed or negative values
/// are reported and replaced by rail 0.
fn supply_rail(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> usize {
    let idx = ctx.int_or(inv, 0, "RailIndex", 0);
    if idx < 0 {
        ctx.error(format!(
            "RailIndex is expected to be a non-negative integer in {}",
            inv.command.name()
        ));
        return 0;
    }
    idx as usize
}

/// `PowerSupply`: electrifies a rail from this block onwards.
pub(super) fn power_supply(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let rail = supply_rail(ctx, inv);
    let kind = supply_kind(ctx, inv);
    let mut supply = PowerSupply::defaults(kind.unwrap_or(PowerSupplyKind::OverheadLine));
    if let Some(text) = inv.arg(2) {
        match text.trim().to_ascii_uppercase().as_str() {
            "AC" | "0" => supply.current = CurrentKind::Ac,
            "DC" | "1" => supply.current = CurrentKind::Dc,
            _ => invalid(ctx, inv, "Voltage type"),
        }
    }
    supply.voltage = ctx.double_or(inv, 3, "Voltage", supply.voltage);
    supply.amps = ctx.double_or(inv, 4, "Amperage", supply.amps);
    supply.contact_height = ctx.double_or(inv, 5, "Contact height", supply.contact_height);
    warn_unstarted(ctx, inv, rail);

    let Some(kind) = kind else {
        return;
    };
    if let Some(r) = ctx.block().rails.get_mut(rail) {
        r.power_supplies.insert(kind, supply);
    }
}

pub(super) fn power_supply_end(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let rail = supply_rail(ctx, inv);
    let Some(kind) = supply_kind(ctx, inv) else {
        return;
    };
    if let Some(r) = ctx.block().rails.get_mut(rail) {
        r.power_supplies.remove(&kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[test]
    fn horn_blow_validates_type_and_trigger() {
        let mut h = Harness::new();
        h.run("HornBlow", &["3"]);
        h.run("HornBlow", &["2", "-1", "1", "2.5"]);
        h.run("HornBlow", &["1", "50", "4"]);
        let horns = &h.block(0).horn_blows;
        assert_eq!(horns.len(), 2);
        assert_eq!(horns[0].kind, HornKind::Music);
        assert!(horns[0].trigger_once);
        assert_eq!(horns[0].position.x, 2.5);
        assert_eq!(horns[1].beacon_object, -1);
        assert!(!horns[1].trigger_once);
        assert_eq!(h.error_count(), 3);
    }

    #[test]
    fn pre_train_times_should_ascend() {
        let mut h = Harness::new();
        h.run("PreTrain", &["8.00"]);
        h.at(100.0);
        h.run("PreTrain", &["7.59"]);
        h.run("PreTrain", &[]);
        let p = &h.data().pretrain;
        assert_eq!(p.len(), 2);
        assert_eq!(p[1].track_position, 100.0);
        assert_eq!(p[1].time, 7.0 * 3600.0 + 59.0 * 60.0);
        assert_eq!(h.error_count(), 2);
    }

    #[test]
    fn power_supply_uses_kind_defaults_and_overrides() {
        let mut h = Harness::new();
        h.run("PowerSupply", &["0", "THIRDRAIL"]);
        h.run("PowerSupply", &["0", "1", "DC", "1500", "", "5.1"]);
        let r = h.block(0).rails.get(0).unwrap();
        let third = r.power_supplies[&PowerSupplyKind::ThirdRail];
        assert_eq!(third.voltage, 750.0);
        assert_eq!(third.current, CurrentKind::Dc);
        let ohle = r.power_supplies[&PowerSupplyKind::OverheadLine];
        assert_eq!(ohle.current, CurrentKind::Dc);
        assert_eq!(ohle.voltage, 1500.0);
        assert_eq!(ohle.amps, 1000.0);
        assert_eq!(ohle.contact_height, 5.1);
        h.at(25.0);
        assert_eq!(h.block(1).rails.get(0).unwrap().power_supplies.len(), 2);
    }

    #[test]
    fn power_supply_needs_known_type_and_rail() {
        let mut h = Harness::new();
        h.run("PowerSupply", &["0"]);
        h.run("PowerSupply", &["0", "steam"]);
        h.run("PowerSupply", &["4", "1"]);
        assert!(h.block(0).rails.get(0).unwrap().power_supplies.is_empty());
        assert!(h.block(0).rails.get(4).is_none());
        assert_eq!(h.error_count(), 1);
        assert_eq!(h.warning_count(), 1);
    }

    #[test]
    fn power_supply_end_removes_kind() {
        let mut h = Harness::new();
        h.run("PowerSupply", &["0", "OHLE"]);
        h.at(25.0);
        h.run("PowerSupplyEnd", &["0", "ohle"]);
        assert!(h.block(1).rails.get(0).unwrap().power_supplies.is_empty());
        assert_eq!(h.block(0).rails.get(0).unwrap().power_supplies.len(), 1);
    }
}
