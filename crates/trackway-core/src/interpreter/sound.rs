//! Track-side sounds: announcements, Doppler sources and microphones.

use super::{existing_file, invalid};
use crate::block::{SoundSource, TrackSound};
use crate::command::{Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// Sound file argument that must name an existing file.
fn sound_file(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize) -> Option<String> {
    if inv.arg(index).is_none() {
        ctx.file_not_found(format!("FileName is empty in {}", inv.command.name()));
        return None;
    }
    existing_file(ctx, inv, index, "FileName")
}

fn push_sound(
    ctx: &mut ParseContext<'_>,
    file: Option<String>,
    source: SoundSource,
    position: Vector2,
    all_cars: bool,
    rail: usize,
) {
    let sound = TrackSound {
        track_position: ctx.track_position(),
        file,
        source,
        position,
        all_cars,
        rail,
    };
    ctx.block().sounds.push(sound);
}

/// `Announce` / `AnnounceAll`: played on the train when it passes.
pub(super) fn announce(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.is_empty() {
        ctx.error(format!(
            "{} is expected to have between 1 and 2 arguments",
            inv.command.name()
        ));
        return;
    }
    let Some(file) = sound_file(ctx, inv, 0) else {
        return;
    };
    let speed = ctx.double_or(inv, 1, "Speed", 0.0) * ctx.options.unit_of_speed;
    let all_cars = inv.command == TrackCommand::AnnounceAll;
    push_sound(ctx, Some(file), SoundSource::Train { speed }, Vector2::ZERO, all_cars, 0);
}

/// `RailAnnounce` / `RailAnnounceAll`: as `Announce`, for trains on a
/// specific rail.
pub(super) fn rail_announce(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.len() < 2 {
        ctx.error(format!(
            "{} is expected to have between 2 and 3 arguments",
            inv.command.name()
        ));
        return;
    }
    let rail = match inv.int(0) {
        Parsed::Value(r) if r >= 0 => r as usize,
        _ => {
            invalid(ctx, inv, "RailIndex");
            return;
        }
    };
    let Some(file) = sound_file(ctx, inv, 1) else {
        return;
    };
    let speed = ctx.double_or(inv, 2, "Speed", 0.0) * ctx.options.unit_of_speed;
    let all_cars = inv.command == TrackCommand::RailAnnounceAll;
    push_sound(ctx, Some(file), SoundSource::Train { speed }, Vector2::ZERO, all_cars, rail);
}

/// `Doppler` / `DopplerAll`: a stationary looping source beside the track.
pub(super) fn doppler(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if inv.args.is_empty() {
        ctx.error(format!(
            "{} is expected to have between 1 and 3 arguments",
            inv.command.name()
        ));
        return;
    }
    let Some(file) = sound_file(ctx, inv, 0) else {
        return;
    };
    let x = ctx.length_or(inv, 1, "X", 0.0);
    let y = ctx.length_or(inv, 2, "Y", 0.0);
    let all_cars = inv.command == TrackCommand::DopplerAll;
    push_sound(ctx, Some(file), SoundSource::World, Vector2::new(x, y), all_cars, 0);
}

fn tolerance(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize, what: &str) -> f64 {
    let value = ctx.length_or(inv, index, what, 0.0);
    if value < 0.0 {
        ctx.error(format!(
            "{what} is expected to be non-negative in {}",
            inv.command.name()
        ));
        return 0.0;
    }
    value
}

/// `MicSound`: a microphone relaying train noise heard within range.
pub(super) fn mic_sound(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let x = ctx.length_or(inv, 0, "X", 0.0);
    let y = ctx.length_or(inv, 1, "Y", 0.0);
    let backward = tolerance(ctx, inv, 2, "BackwardTolerance");
    let forward = tolerance(ctx, inv, 3, "ForwardTolerance");
    push_sound(
        ctx,
        None,
        SoundSource::Microphone { forward, backward },
        Vector2::new(x, y),
        false,
        0,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[test]
    fn announce_converts_speed() {
        let mut h = Harness::new();
        h.run("Announce", &["bell.wav", "36"]);
        h.run("AnnounceAll", &["bell.wav"]);
        let s = &h.block(0).sounds;
        let SoundSource::Train { speed } = s[0].source else {
            panic!("expected train sound");
        };
        assert!((speed - 10.0).abs() < 1e-9);
        assert!(!s[0].all_cars);
        assert!(s[1].all_cars);
        assert_eq!(s[1].source, SoundSource::Train { speed: 0.0 });
    }

    #[test]
    fn announce_reports_missing_files() {
        let mut h = Harness::new();
        h.run("Announce", &[]);
        h.run("Announce", &["nope.wav"]);
        h.run("Announce", &["bad|name.wav"]);
        assert!(h.block(0).sounds.is_empty());
        assert_eq!(h.error_count(), 3);
        assert_eq!(h.file_not_found_count(), 1);
    }

    #[test]
    fn rail_announce_binds_rail() {
        let mut h = Harness::new();
        h.run("RailAnnounce", &["2", "bell.wav", "18"]);
        h.run("RailAnnounceAll", &["-1", "bell.wav"]);
        h.run("RailAnnounce", &["2"]);
        let s = &h.block(0).sounds;
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].rail, 2);
        assert_eq!(h.error_count(), 2);
    }

    #[test]
    fn doppler_is_positioned() {
        let mut h = Harness::new();
        h.run("DopplerAll", &["bell.wav", "3", "1"]);
        let s = &h.block(0).sounds[0];
        assert_eq!(s.source, SoundSource::World);
        assert_eq!(s.position, Vector2::new(3.0, 1.0));
        assert!(s.all_cars);
    }

    #[test]
    fn mic_sound_clamps_negative_ranges() {
        let mut h = Harness::new();
        h.run("MicSound", &["1", "2", "-5", "30"]);
        let s = &h.block(0).sounds[0];
        assert_eq!(s.file, None);
        assert_eq!(
            s.source,
            SoundSource::Microphone {
                forward: 30.0,
                backward: 0.0
            }
        );
        assert_eq!(h.error_count(), 1);
    }
}
