//! Brightness, fog, weather, lighting and on-screen markers.

use super::invalid;
use crate::block::{
    BrightnessDef, Fog, LightDefinition, LightingChange, Marker, MarkerColor, MarkerMessage,
    NO_FOG_END, NO_FOG_START, PointOfInterest,
};
use crate::catalog::StructureKind;
use crate::command::{Invocation, TrackCommand};
use crate::context::{ParseContext, Parsed};
use crate::math::Vector2;

/// Shortest marker span, used when start and end collapse.
const MIN_MARKER_SPAN: f64 = 0.01;

pub(super) fn brightness(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let value = ctx.double_or(inv, 0, "Value", 255.0);
    let value = (value / 255.0).clamp(0.0, 1.0);
    let track_position = ctx.track_position();
    ctx.block().brightness.push(BrightnessDef {
        track_position,
        value,
    });
}

/// `Fog`: a start distance not below the end distance disables fog.
pub(super) fn fog(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let start = ctx.double_or(inv, 0, "StartingDistance", 0.0);
    let end = ctx.double_or(inv, 1, "EndingDistance", 0.0);
    let r = ctx.byte_or(inv, 2, "RedValue", 128);
    let g = ctx.byte_or(inv, 3, "GreenValue", 128);
    let b = ctx.byte_or(inv, 4, "BlueValue", 128);
    let (start, end) = if start < end {
        (start, end)
    } else {
        (NO_FOG_START, NO_FOG_END)
    };
    let block = ctx.block();
    block.fog = Fog {
        start,
        end,
        color: [r, g, b],
    };
    block.fog_defined = true;
}

/// Visible range of a marker placed at `position`. A negative distance
/// shows the marker ahead of the position instead of behind it.
fn marker_span(position: f64, distance: f64) -> (f64, f64) {
    let (start, end) = if distance < 0.0 {
        (position, position - distance)
    } else {
        (position - distance, position)
    };
    let (start, end) = (start.max(0.0), end.max(0.0));
    if end <= start {
        (start, start + MIN_MARKER_SPAN)
    } else {
        (start, end)
    }
}

/// `Marker` (image) and `TextMarker`.
pub(super) fn marker(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let Some(first) = inv.args.first() else {
        ctx.error(format!(
            "{} is expected to have at least one argument",
            inv.command.name()
        ));
        return;
    };
    if first.chars().any(|c| matches!(c, '<' | '>' | '|' | '"' | '\0')) {
        ctx.error(format!(
            "FileName {first} contains illegal characters in {}",
            inv.command.name()
        ));
        return;
    }
    let text_marker = inv.command == TrackCommand::TextMarker;
    if !text_marker && !ctx.catalog.has_file(first) {
        ctx.file_not_found(format!(
            "FileName {first} not found in {}",
            inv.command.name()
        ));
        return;
    }

    let distance = ctx.length_or(inv, 1, "Distance", ctx.block_interval());
    let (start, end) = marker_span(ctx.track_position(), distance);
    let message = if text_marker {
        let color = match inv.arg(2) {
            None => MarkerColor::White,
            Some(c) => MarkerColor::parse(c).unwrap_or_else(|| {
                invalid(ctx, inv, "MessageColor");
                MarkerColor::White
            }),
        };
        MarkerMessage::Text {
            text: first.clone(),
            color,
        }
    } else {
        MarkerMessage::Image {
            file: first.clone(),
        }
    };
    ctx.data.markers.push(Marker {
        start,
        end,
        message,
    });
}

/// `PointOfInterest` / `POI`: a jump target shown in the route viewer.
pub(super) fn point_of_interest(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    let rail = ctx.int_or(inv, 0, "RailIndex", 0);
    if rail < 0 {
        ctx.error(format!(
            "RailIndex is expected to be non-negative in {}",
            inv.command.name()
        ));
        return;
    }
    let rail = rail as usize;
    if !ctx.block_ref().rail_started(rail) {
        ctx.error(format!(
            "RailIndex {rail} references a non-existing rail in {}",
            inv.command.name()
        ));
    }
    let x = ctx.length_or(inv, 1, "X", 0.0);
    let y = ctx.length_or(inv, 2, "Y", 0.0);
    let (yaw, pitch, roll) = ctx.orientation(inv, 3);
    let poi = PointOfInterest {
        track_position: ctx.track_position(),
        rail,
        text: inv.arg(6).map(str::to_string),
        position: Vector2::new(x, y),
        yaw,
        pitch,
        roll,
    };
    ctx.block().points_of_interest.push(poi);
}

/// `Rain` / `Snow`: precipitation intensity and the weather object that
/// renders it. Both carry into later blocks.
pub(super) fn weather(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    match inv.int(0) {
        Parsed::Value(v) => {
            let block = ctx.block();
            if inv.command == TrackCommand::Snow {
                block.snow_intensity = v;
            } else {
                block.rain_intensity = v;
            }
        }
        Parsed::Missing => {}
        Parsed::Invalid => invalid(ctx, inv, "Intensity"),
    }
    match inv.int(1) {
        Parsed::Value(s) if s >= 0 && ctx.catalog.has(StructureKind::Weather, s as usize) => {
            ctx.block().weather_object = Some(s);
        }
        Parsed::Value(s) => ctx.error(format!(
            "WeatherStructureIndex {s} was not found in {}",
            inv.command.name()
        )),
        Parsed::Missing => {}
        Parsed::Invalid => invalid(ctx, inv, "WeatherStructureIndex"),
    }
}

/// Records a static lighting change and makes it current.
fn change_light(ctx: &mut ParseContext<'_>, update: impl FnOnce(&mut LightDefinition)) {
    let block = ctx.block();
    let previous = block.light_definition;
    let mut next = previous;
    update(&mut next);
    block.lighting_changes.push(LightingChange::Static { previous, next });
    block.light_definition = next;
}

fn dynamic_lighting_active(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) -> bool {
    if ctx.options.dynamic_lighting {
        ctx.warning(format!(
            "Dynamic lighting is enabled; {} will be ignored",
            inv.command.name()
        ));
        return true;
    }
    false
}

/// `AmbientLight` / `DirectionalLight`.
pub(super) fn light_color(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if dynamic_lighting_active(ctx, inv) {
        return;
    }
    let r = ctx.byte_or(inv, 0, "RedValue", 255);
    let g = ctx.byte_or(inv, 1, "GreenValue", 255);
    let b = ctx.byte_or(inv, 2, "BlueValue", 255);
    let diffuse = inv.command == TrackCommand::DirectionalLight;
    change_light(ctx, |ld| {
        if diffuse {
            ld.diffuse = [r, g, b];
        } else {
            ld.ambient = [r, g, b];
        }
    });
}

pub(super) fn light_direction(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    if dynamic_lighting_active(ctx, inv) {
        return;
    }
    let theta = ctx.double_or(inv, 0, "Theta", 60.0);
    let phi = ctx.double_or(inv, 1, "Phi", -26.565_051_177_078);
    let direction = LightDefinition::direction_from_angles(theta, phi);
    change_light(ctx, |ld| ld.direction = direction);
}

/// `DynamicLight`: switches to another light set declared by the route.
pub(super) fn dynamic_light(ctx: &mut ParseContext<'_>, inv: &Invocation<'_>) {
    match inv.int(0) {
        Parsed::Value(next) => {
            let block = ctx.block();
            let previous = block.dynamic_light;
            block
                .lighting_changes
                .push(LightingChange::Dynamic { previous, next });
            block.dynamic_light = Some(next);
        }
        Parsed::Missing => {}
        Parsed::Invalid => invalid(ctx, inv, "DynamicLightIndex"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::Harness;

    #[test]
    fn brightness_is_normalized() {
        let mut h = Harness::new();
        h.run("Brightness", &["128"]);
        h.run("Brightness", &["400"]);
        h.run("Brightness", &["dim"]);
        let b = &h.block(0).brightness;
        assert!((b[0].value - 128.0 / 255.0).abs() < 1e-12);
        assert_eq!(b[1].value, 1.0);
        assert_eq!(b[2].value, 1.0);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn fog_needs_increasing_range() {
        let mut h = Harness::new();
        h.run("Fog", &["100", "500", "10", "20", "30"]);
        let f = h.block(0).fog;
        assert_eq!((f.start, f.end), (100.0, 500.0));
        assert_eq!(f.color, [10, 20, 30]);
        assert!(h.block(0).fog_defined);
        h.run("Fog", &["500", "100"]);
        let f = h.block(0).fog;
        assert_eq!((f.start, f.end), (NO_FOG_START, NO_FOG_END));
        assert_eq!(f.color, [128, 128, 128]);
    }

    #[test]
    fn fog_carries_but_definition_does_not() {
        let mut h = Harness::new();
        h.run("Fog", &["100", "500"]);
        h.at(25.0);
        assert_eq!(h.block(1).fog.start, 100.0);
        assert!(!h.block(1).fog_defined);
    }

    #[test]
    fn marker_span_follows_distance_sign() {
        assert_eq!(marker_span(100.0, 25.0), (75.0, 100.0));
        assert_eq!(marker_span(100.0, -25.0), (100.0, 125.0));
        assert_eq!(marker_span(10.0, 25.0), (0.0, 10.0));
        assert_eq!(marker_span(0.0, 0.0), (0.0, MIN_MARKER_SPAN));
    }

    #[test]
    fn image_marker_needs_file() {
        let mut h = Harness::new();
        h.at(50.0);
        h.run("Marker", &["signs/missing.png"]);
        assert_eq!(h.file_not_found_count(), 1);
        h.run("Marker", &["signs/stop.png", "-10"]);
        let m = &h.data().markers[0];
        assert_eq!((m.start, m.end), (50.0, 60.0));
        assert_eq!(
            m.message,
            MarkerMessage::Image {
                file: "signs/stop.png".into()
            }
        );
    }

    #[test]
    fn text_marker_color() {
        let mut h = Harness::new();
        h.run("TextMarker", &["Caution", "", "red"]);
        h.run("TextMarker", &["Slow", "", "teal"]);
        h.run("TextMarker", &[]);
        let m = &h.data().markers;
        assert_eq!(
            m[0].message,
            MarkerMessage::Text {
                text: "Caution".into(),
                color: MarkerColor::Red
            }
        );
        assert!(matches!(
            m[1].message,
            MarkerMessage::Text {
                color: MarkerColor::White,
                ..
            }
        ));
        assert_eq!(h.error_count(), 2);
    }

    #[test]
    fn poi_on_unstarted_rail_is_reported_but_kept() {
        let mut h = Harness::new();
        h.run("POI", &["3", "1", "2", "", "", "", "Bridge"]);
        let p = &h.block(0).points_of_interest[0];
        assert_eq!(p.rail, 3);
        assert_eq!(p.text.as_deref(), Some("Bridge"));
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn poi_with_negative_rail_is_skipped() {
        let mut h = Harness::new();
        h.run("POI", &["-2", "1", "2", "", "", "", "Bridge"]);
        assert!(h.block(0).points_of_interest.is_empty());
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn weather_sets_intensity_and_object() {
        let mut h = Harness::new();
        h.run("Rain", &["40", "1"]);
        h.run("Snow", &["x", "7"]);
        let b = h.block(0);
        assert_eq!(b.rain_intensity, 40);
        assert_eq!(b.snow_intensity, 0);
        assert_eq!(b.weather_object, Some(1));
        assert_eq!(h.error_count(), 2);
        h.at(25.0);
        assert_eq!(h.block(1).rain_intensity, 40);
    }

    #[test]
    fn light_changes_record_previous_state() {
        let mut h = Harness::new();
        h.run("AmbientLight", &["10", "20", "30"]);
        h.run("DirectionalLight", &["", "300"]);
        h.run("LightDirection", &["90", "0"]);
        let b = h.block(0);
        assert_eq!(b.lighting_changes.len(), 3);
        let LightingChange::Static { previous, next } = b.lighting_changes[1] else {
            panic!("expected static change");
        };
        assert_eq!(previous.ambient, [10, 20, 30]);
        assert_eq!(next.diffuse, [255, 255, 255]);
        assert!((b.light_definition.direction.y - 1.0).abs() < 1e-9);
        assert_eq!(h.error_count(), 1);
    }

    #[test]
    fn static_light_is_ignored_with_dynamic_lighting() {
        let mut h = Harness::with_options(|o| o.dynamic_lighting = true);
        h.run("AmbientLight", &["10"]);
        h.run("LightDirection", &[]);
        assert!(h.block(0).lighting_changes.is_empty());
        assert_eq!(h.warning_count(), 2);
    }

    #[test]
    fn dynamic_light_chains_sets() {
        let mut h = Harness::new();
        h.run("DynamicLight", &["2"]);
        h.run("DynamicLight", &["5"]);
        h.run("DynamicLight", &["?"]);
        let c = &h.block(0).lighting_changes;
        assert_eq!(
            c[0],
            LightingChange::Dynamic {
                previous: None,
                next: 2
            }
        );
        assert_eq!(
            c[1],
            LightingChange::Dynamic {
                previous: Some(2),
                next: 5
            }
        );
        assert_eq!(h.error_count(), 1);
    }
}
