//! Command handlers, one module per command family.
//!
//! Handlers never fail. Malformed arguments are replaced by their documented
//! defaults and reported through the context; structural problems (a stop
//! without a station, a rail index below zero) skip only the command's own
//! effects.

mod beacons;
mod misc;
mod rails;
mod signalling;
mod sound;
mod stations;
mod structures;
mod visual;

pub(crate) use rails::sign;

use crate::command::{Handler, Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};

/// Handler for a command. Aliases map to the same function.
pub fn handler_for(command: TrackCommand) -> Handler {
    use TrackCommand as C;
    match command {
        C::Rail | C::RailStart => rails::rail,
        C::RailEnd => rails::rail_end,
        C::RailType => rails::rail_type,
        C::Accuracy => rails::accuracy,
        C::Pitch => rails::pitch,
        C::Curve => rails::curve,
        C::Turn => rails::turn,
        C::Adhesion => rails::adhesion,
        C::Height => rails::height,
        C::Switch | C::SwitchT => rails::switch,
        C::PlayerPath => rails::player_path,
        C::RailLimit => rails::rail_limit,
        C::RailBuffer => rails::rail_buffer,
        C::RailAccuracy => rails::rail_accuracy,
        C::RailAdhesion => rails::rail_adhesion,
        C::Section | C::SectionS | C::SectionP => signalling::section,
        C::SigF => signalling::sig_f,
        C::Signal | C::Sig => signalling::signal,
        C::Relay => signalling::relay,
        C::Beacon => beacons::beacon,
        C::Transponder | C::Tr => beacons::transponder,
        C::AtsSn => beacons::ats_sn,
        C::AtsP => beacons::ats_p,
        C::Pattern => beacons::pattern,
        C::PLimit => beacons::p_limit,
        C::Destination => beacons::destination,
        C::Limit => signalling::limit,
        C::Sta => stations::sta,
        C::Station => stations::station,
        C::StationXml => stations::station_xml,
        C::Stop | C::StopPos => stations::stop,
        C::Buffer => stations::buffer,
        C::Form => structures::form,
        C::Pole => structures::pole,
        C::PoleEnd => structures::pole_end,
        C::Wall | C::Dike => structures::wall_or_dike,
        C::WallEnd | C::DikeEnd => structures::wall_or_dike_end,
        C::Ground => structures::ground,
        C::Crack => structures::crack,
        C::FreeObj => structures::free_obj,
        C::Back | C::Background => structures::background,
        C::PatternObj => structures::pattern_obj,
        C::PatternEnd => structures::pattern_end,
        C::Brightness => visual::brightness,
        C::Fog => visual::fog,
        C::Marker | C::TextMarker => visual::marker,
        C::PointOfInterest | C::Poi => visual::point_of_interest,
        C::Rain | C::Snow => visual::weather,
        C::AmbientLight | C::DirectionalLight => visual::light_color,
        C::LightDirection => visual::light_direction,
        C::DynamicLight => visual::dynamic_light,
        C::Announce | C::AnnounceAll => sound::announce,
        C::RailAnnounce | C::RailAnnounceAll => sound::rail_announce,
        C::Doppler | C::DopplerAll => sound::doppler,
        C::MicSound => sound::mic_sound,
        C::HornBlow => misc::horn_blow,
        C::PreTrain => misc::pre_train,
        C::PowerSupply => misc::power_supply,
        C::PowerSupplyEnd => misc::power_supply_end,
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn invalid(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, what: &str) {
    ctx.error(format!("{what} is invalid in {}", inv.command.name()));
}

/// Reads a required integer: a malformed value reports and returns `None`,
/// a missing one yields `missing`.
fn strict_int(
    ctx: &mut ParseContext<'_>,
    inv: &Invocation<'_>,
    index: usize,
    what: &str,
    missing: i32,
) -> Option<i32> {
    match inv.int(index) {
        Parsed::Value(v) => Some(v),
        Parsed::Missing => Some(missing),
        Parsed::Invalid => {
            invalid(ctx, inv, what);
            None
        }
    }
}

/// Rail index that must not be negative. Missing or malformed values give
/// `0`; negative ones are reported and give `None`.
fn rail_index(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, index: usize) -> Option<usize> {
    let idx = ctx.int_or(inv, index, "RailIndex", 0);
    if idx < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return None;
    }
    Some(idx as usize)
}

/// Warns when `rail` is not running in the current block.
fn warn_unstarted(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>, rail: usize) {
    if !ctx.block_ref().rail_started(rail) {
        ctx.warning(format!(
            "RailIndex {rail} could be out of range in {}",
            inv.command.name()
        ));
    }
}

/// File reference resolved against the catalog. Reports and returns `None`
/// when the file does not exist.
fn existing_file(
    ctx: &mut ParseContext<'_>,
    inv: &Invocation<'_>,
    index: usize,
    what: &str,
) -> Option<String> {
    let file = inv.arg(index)?;
    if file.chars().any(|c| matches!(c, '<' | '>' | '|' | '"' | '\0')) {
        ctx.error(format!("{what} contains illegal characters in {}", inv.command.name()));
        return None;
    }
    if !ctx.catalog.has_file(file) {
        ctx.file_not_found(format!("{what} {file} not found in {}", inv.command.name()));
        return None;
    }
    Some(file.to_string())
}
