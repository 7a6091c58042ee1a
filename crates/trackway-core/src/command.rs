//! Track command names and the dispatch table.
//!
//! The script front end resolves a command name to a [`TrackCommand`] once;
//! the interpreter then calls the handler stored for that variant in a table
//! that is built on first use.

use std::sync::OnceLock;

use crate::context::ParseContext;

/// Every command in the `Track` namespace. Aliases are distinct variants that
/// share a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackCommand {
    Rail,
    RailStart,
    RailEnd,
    RailType,
    Accuracy,
    Pitch,
    Curve,
    Turn,
    Adhesion,
    Height,
    Switch,
    SwitchT,
    PlayerPath,
    RailLimit,
    RailBuffer,
    RailAccuracy,
    RailAdhesion,
    Section,
    SectionS,
    SectionP,
    SigF,
    Signal,
    Sig,
    Relay,
    Beacon,
    Transponder,
    Tr,
    AtsSn,
    AtsP,
    Pattern,
    PLimit,
    Destination,
    Limit,
    Sta,
    Station,
    StationXml,
    Stop,
    StopPos,
    Buffer,
    Form,
    Pole,
    PoleEnd,
    Wall,
    WallEnd,
    Dike,
    DikeEnd,
    Ground,
    Crack,
    FreeObj,
    Back,
    Background,
    PatternObj,
    PatternEnd,
    Brightness,
    Fog,
    Marker,
    TextMarker,
    PointOfInterest,
    Poi,
    Rain,
    Snow,
    AmbientLight,
    DirectionalLight,
    LightDirection,
    DynamicLight,
    Announce,
    AnnounceAll,
    RailAnnounce,
    RailAnnounceAll,
    Doppler,
    DopplerAll,
    MicSound,
    HornBlow,
    PreTrain,
    PowerSupply,
    PowerSupplyEnd,
}

/// Canonical spelling of each command, in declaration order.
const NAMES: &[(TrackCommand, &str)] = &[
    (TrackCommand::Rail, "Rail"),
    (TrackCommand::RailStart, "RailStart"),
    (TrackCommand::RailEnd, "RailEnd"),
    (TrackCommand::RailType, "RailType"),
    (TrackCommand::Accuracy, "Accuracy"),
    (TrackCommand::Pitch, "Pitch"),
    (TrackCommand::Curve, "Curve"),
    (TrackCommand::Turn, "Turn"),
    (TrackCommand::Adhesion, "Adhesion"),
    (TrackCommand::Height, "Height"),
    (TrackCommand::Switch, "Switch"),
    (TrackCommand::SwitchT, "SwitchT"),
    (TrackCommand::PlayerPath, "PlayerPath"),
    (TrackCommand::RailLimit, "RailLimit"),
    (TrackCommand::RailBuffer, "RailBuffer"),
    (TrackCommand::RailAccuracy, "RailAccuracy"),
    (TrackCommand::RailAdhesion, "RailAdhesion"),
    (TrackCommand::Section, "Section"),
    (TrackCommand::SectionS, "SectionS"),
    (TrackCommand::SectionP, "SectionP"),
    (TrackCommand::SigF, "SigF"),
    (TrackCommand::Signal, "Signal"),
    (TrackCommand::Sig, "Sig"),
    (TrackCommand::Relay, "Relay"),
    (TrackCommand::Beacon, "Beacon"),
    (TrackCommand::Transponder, "Transponder"),
    (TrackCommand::Tr, "Tr"),
    (TrackCommand::AtsSn, "AtsSn"),
    (TrackCommand::AtsP, "AtsP"),
    (TrackCommand::Pattern, "Pattern"),
    (TrackCommand::PLimit, "PLimit"),
    (TrackCommand::Destination, "Destination"),
    (TrackCommand::Limit, "Limit"),
    (TrackCommand::Sta, "Sta"),
    (TrackCommand::Station, "Station"),
    (TrackCommand::StationXml, "StationXML"),
    (TrackCommand::Stop, "Stop"),
    (TrackCommand::StopPos, "StopPos"),
    (TrackCommand::Buffer, "Buffer"),
    (TrackCommand::Form, "Form"),
    (TrackCommand::Pole, "Pole"),
    (TrackCommand::PoleEnd, "PoleEnd"),
    (TrackCommand::Wall, "Wall"),
    (TrackCommand::WallEnd, "WallEnd"),
    (TrackCommand::Dike, "Dike"),
    (TrackCommand::DikeEnd, "DikeEnd"),
    (TrackCommand::Ground, "Ground"),
    (TrackCommand::Crack, "Crack"),
    (TrackCommand::FreeObj, "FreeObj"),
    (TrackCommand::Back, "Back"),
    (TrackCommand::Background, "Background"),
    (TrackCommand::PatternObj, "PatternObj"),
    (TrackCommand::PatternEnd, "PatternEnd"),
    (TrackCommand::Brightness, "Brightness"),
    (TrackCommand::Fog, "Fog"),
    (TrackCommand::Marker, "Marker"),
    (TrackCommand::TextMarker, "TextMarker"),
    (TrackCommand::PointOfInterest, "PointOfInterest"),
    (TrackCommand::Poi, "POI"),
    (TrackCommand::Rain, "Rain"),
    (TrackCommand::Snow, "Snow"),
    (TrackCommand::AmbientLight, "AmbientLight"),
    (TrackCommand::DirectionalLight, "DirectionalLight"),
    (TrackCommand::LightDirection, "LightDirection"),
    (TrackCommand::DynamicLight, "DynamicLight"),
    (TrackCommand::Announce, "Announce"),
    (TrackCommand::AnnounceAll, "AnnounceAll"),
    (TrackCommand::RailAnnounce, "RailAnnounce"),
    (TrackCommand::RailAnnounceAll, "RailAnnounceAll"),
    (TrackCommand::Doppler, "Doppler"),
    (TrackCommand::DopplerAll, "DopplerAll"),
    (TrackCommand::MicSound, "MicSound"),
    (TrackCommand::HornBlow, "HornBlow"),
    (TrackCommand::PreTrain, "PreTrain"),
    (TrackCommand::PowerSupply, "PowerSupply"),
    (TrackCommand::PowerSupplyEnd, "PowerSupplyEnd"),
];

impl TrackCommand {
    /// All commands, in declaration order.
    pub fn all() -> impl Iterator<Item = TrackCommand> {
        NAMES.iter().map(|(c, _)| *c)
    }

    /// Case-insensitive lookup of a bare command name (no namespace).
    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(c, _)| *c)
    }

    /// Bare name, e.g. `Rail`.
    pub fn bare_name(self) -> &'static str {
        NAMES[self as usize].1
    }

    /// Qualified name used in diagnostics, e.g. `Track.Rail`.
    pub fn name(self) -> String {
        format!("Track.{}", self.bare_name())
    }
}

/// One resolved command with its arguments.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub command: TrackCommand,
    pub args: &'a [String],
    /// Values of a `Command(a;b)` suffix.
    pub indices: [Option<i32>; 2],
}

impl<'a> Invocation<'a> {
    pub fn new(command: TrackCommand, args: &'a [String]) -> Self {
        Self {
            command,
            args,
            indices: [None, None],
        }
    }

    pub fn with_indices(mut self, indices: [Option<i32>; 2]) -> Self {
        self.indices = indices;
        self
    }
}

/// Handler signature shared by every command.
pub type Handler = fn(&mut ParseContext<'_>, &Invocation<'_>);

/// Command-to-handler table, indexed by discriminant.
pub fn dispatch_table() -> &'static [Handler] {
    static TABLE: OnceLock<Vec<Handler>> = OnceLock::new();
    TABLE.get_or_init(|| {
        TrackCommand::all()
            .map(crate::interpreter::handler_for)
            .collect()
    })
}

/// Runs the handler for `inv.command`.
pub fn dispatch(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let handler = dispatch_table()[inv.command as usize];
    handler(ctx, inv);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_in_discriminant_order() {
        for (i, (cmd, _)) in NAMES.iter().enumerate() {
            assert_eq!(*cmd as usize, i, "{cmd:?} out of order");
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(TrackCommand::from_name("railstart"), Some(TrackCommand::RailStart));
        assert_eq!(TrackCommand::from_name("STATIONXML"), Some(TrackCommand::StationXml));
        assert_eq!(TrackCommand::from_name("poi"), Some(TrackCommand::Poi));
        assert_eq!(TrackCommand::from_name("Teleport"), None);
    }

    #[test]
    fn qualified_name() {
        assert_eq!(TrackCommand::SigF.name(), "Track.SigF");
    }

    #[test]
    fn table_covers_every_command() {
        assert_eq!(dispatch_table().len(), TrackCommand::all().count());
    }
}
