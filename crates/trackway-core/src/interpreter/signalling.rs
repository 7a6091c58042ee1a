//! Sections, signals and speed limits.

use super::invalid;
use crate::block::{LimitDef, SectionDef, SectionKind, SignalDef, SignalObject};
use crate::command::{Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// Vertical offset used when a signal is declared with a negative height
/// (signal mounted on its own post).
const POST_SIGNAL_HEIGHT: f64 = 4.8;

/// Drops everything after a decimal point that is later followed by a
/// letter: `2.5a;3` reads as a mistyped `2`.
fn strip_missing_comma(args: &[String]) -> Vec<String> {
    let mut out: Vec<String> = args.to_vec();
    for i in 0..out.len() {
        let Some(dot) = out[i].find('.') else {
            continue;
        };
        if out[i][dot + 1..].chars().any(|c| c.is_ascii_alphabetic()) {
            out[i].truncate(dot);
            out.truncate(i + 1);
            break;
        }
    }
    out
}

/// `Section`, `SectionS` and `SectionP`.
pub(super) fn section(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.is_empty() {
        ctx.error(format!(
            "At least one argument is required in {}",
            inv.command.name()
        ));
        return;
    }
    let args = strip_missing_comma(inv.args);
    let stripped = Invocation::new(inv.command, &args);
    let mut aspects = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        let aspect = match stripped.int(i) {
            Parsed::Value(v) if v >= 0 => v,
            Parsed::Value(_) => {
                ctx.error(format!(
                    "Aspect{i} is expected to be non-negative in {}",
                    inv.command.name()
                ));
                -1
            }
            _ => {
                ctx.error(format!("Aspect{i} is invalid in {}", inv.command.name()));
                -1
            }
        };
        aspects.push(aspect);
    }
    let value_based = ctx.options.value_based_sections || inv.command == TrackCommand::SectionS;
    if value_based {
        aspects.sort_unstable();
    }
    let kind = match (inv.command == TrackCommand::SectionP, value_based) {
        (true, true) => SectionKind::PermissiveValueBased,
        (true, false) => SectionKind::PermissiveIndexBased,
        (false, true) => SectionKind::ValueBased,
        (false, false) => SectionKind::IndexBased,
    };
    let departure_station = ctx.take_departure_station();
    let track_position = ctx.track_position();
    ctx.block().sections.push(SectionDef {
        track_position,
        aspects,
        departure_station,
        kind,
        invisible: false,
    });
    ctx.current_section += 1;
}

/// `SigF`: a signal built from a custom or compatibility object.
pub(super) fn sig_f(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let objidx = ctx.int_or(inv, 0, "SignalIndex", 0);
    let object = if objidx >= 0 && ctx.catalog.has_signal(objidx as usize) {
        SignalObject::Custom(objidx as usize)
    } else if objidx >= 0 && (objidx as usize) < ctx.catalog.compatibility_signal_count() {
        ctx.warning(format!(
            "SignalIndex {objidx} refers to a compatibility signal in {}",
            inv.command.name()
        ));
        SignalObject::Compatibility(objidx as usize)
    } else {
        ctx.error(format!(
            "SignalIndex {objidx} references a signal object not loaded in {}",
            inv.command.name()
        ));
        return;
    };
    let section = ctx.int_or(inv, 1, "Section", 0);
    let x = ctx.length_or(inv, 2, "X", 0.0);
    let y = ctx.length_or(inv, 3, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 4);
    let signal = SignalDef {
        track_position: ctx.track_position(),
        section: ctx.current_section + section,
        object,
        position: Vector2::new(x, if y < 0.0 { POST_SIGNAL_HEIGHT } else { y }),
        yaw,
        pitch,
        roll,
        show_object: true,
        show_post: y < 0.0,
    };
    ctx.block().signals.push(signal);
}

/// Aspects and compatibility object for a `Signal` code. Code -3 shares the
/// entry of 3.
fn signal_code(code: i32) -> Option<(&'static [i32], usize)> {
    Some(match code {
        1 => (&[0, 2, 3], 4),
        2 => (&[0, 2], 0),
        -2 => (&[0, 4], 1),
        -3 | 3 => (&[0, 2, 4], 2),
        4 => (&[0, 1, 2, 4], 3),
        -4 => (&[0, 2, 3, 4], 4),
        5 => (&[0, 1, 2, 3, 4], 5),
        -5 => (&[0, 2, 3, 4, 5], 6),
        6 => (&[0, 1, 2, 3, 4, 5], 7),
        _ => return None,
    })
}

/// `Signal` / `Sig`: a combined section and compatibility signal.
pub(super) fn signal(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let mut num = ctx.int_or(inv, 0, "Aspects", -2);
    if ctx.options.is_rw && num == 0 {
        num = -2;
    }
    let (aspects, comp) = match signal_code(num) {
        Some(entry) => entry,
        None => {
            ctx.error(format!(
                "Aspects has an unsupported value in {}",
                inv.command.name()
            ));
            num = if matches!(num, -3 | -6 | -1) { -num } else { -4 };
            match signal_code(num) {
                Some(entry) => entry,
                None => return,
            }
        }
    };
    let x = ctx.length_or(inv, 2, "X", 0.0);
    let y = ctx.length_or(inv, 3, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 4);

    let departure_station = ctx.take_departure_station();
    let track_position = ctx.track_position();
    ctx.block().sections.push(SectionDef {
        track_position,
        aspects: aspects.to_vec(),
        departure_station,
        kind: SectionKind::ValueBased,
        invisible: x == 0.0,
    });
    ctx.current_section += 1;
    let signal = SignalDef {
        track_position,
        section: ctx.current_section,
        object: SignalObject::Compatibility(comp),
        position: Vector2::new(x, if y < 0.0 { POST_SIGNAL_HEIGHT } else { y }),
        yaw,
        pitch,
        roll,
        show_object: x != 0.0,
        show_post: x != 0.0 && y < 0.0,
    };
    ctx.block().signals.push(signal);
}

/// Compatibility object used for repeater signals.
const RELAY_OBJECT: usize = 8;

/// `Relay`: a repeater showing the next section.
pub(super) fn relay(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let x = ctx.length_or(inv, 0, "X", 0.0);
    let y = ctx.length_or(inv, 1, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 2);
    let signal = SignalDef {
        track_position: ctx.track_position(),
        section: ctx.current_section + 1,
        object: SignalObject::Compatibility(RELAY_OBJECT),
        position: Vector2::new(x, if y < 0.0 { POST_SIGNAL_HEIGHT } else { y }),
        yaw,
        pitch,
        roll,
        show_object: x != 0.0,
        show_post: x != 0.0 && y < 0.0,
    };
    ctx.block().signals.push(signal);
}

/// `Limit`: a speed limit on rail 0.
pub(super) fn limit(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let limit = match inv.double(0) {
        Parsed::Value(v) => v,
        Parsed::Missing => 0.0,
        Parsed::Invalid => {
            invalid(ctx, inv, "Speed");
            0.0
        }
    };
    if limit < 0.0 {
        ctx.error(format!(
            "Speed is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let direction = ctx.int_or(inv, 1, "Direction", 0);
    let course = ctx.int_or(inv, 2, "Cource", 0);
    let speed = if limit == 0.0 {
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
        rail: 0,
    });
}
