//! End-to-end scenarios: route text in, compiled route and follower behavior
//! out.

use trackway_core::block::SignalObject;
use trackway_core::event::{EventKind, TriggerContext, TriggerType};
use trackway_core::follower::TrackFollower;
use trackway_core::station::StationKind;
use trackway_core::test_utils::*;

#[test]
fn rail_end_moves_only_the_end() {
    let mut h = Harness::new();
    h.run("Rail", &["1", "10", "0", "0", "5"]);
    h.run("RailEnd", &["1", "20"]);
    let rail = h.block(0).rails.get(1).expect("rail 1 exists");
    assert_eq!(rail.start.x, 10.0);
    assert_eq!(rail.end.x, 20.0);
    assert_eq!(h.error_count(), 0);
}

#[test]
fn terminal_station_times() {
    // arguments separated by semicolons, commas split CSV expressions
    let route = compile_csv("With Track\n0, .Sta ;8.30;T:8.35\n");
    let s = &route.stations[0];
    assert_eq!(s.arrival_time, Some(30600.0));
    assert_eq!(s.departure_time, Some(30900.0));
    assert_eq!(s.kind, StationKind::Terminal);
}

#[test]
fn three_aspect_compatibility_signal() {
    let route = compile_csv("With Track\n0, .Signal 3;;0\n");
    let section = &route.sections[1];
    assert_eq!(section.aspects, vec![0, 2, 4]);
    assert!(section.invisible);
    assert_eq!(route.signals[0].object, SignalObject::Compatibility(2));
    assert_eq!(route.signals[0].section, 1);
    assert_eq!(route.sections[0].next, Some(1));
}

#[test]
fn follower_crosses_beacon_once() {
    let route = compile_csv("With Track\n55, .Beacon 12;-1;0;99\n");
    let mut f = TrackFollower::new(TriggerType::TrainFront, route.rail_gauge);
    let mut ctx = TriggerContext::new();
    f.teleport(&route.elements, 40.0, true);
    f.advance(&route.elements, 60.0, true, false, &mut ctx);
    let hits: Vec<_> = ctx
        .fired
        .iter()
        .filter(|e| matches!(e.kind, EventKind::Transponder { data: 99, .. }))
        .collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].direction, 1);
    assert_eq!(hits[0].element, 2);
    assert!((hits[0].delta - 5.0).abs() < 1e-9);
}

#[test]
fn follower_tracks_station_and_limits() {
    let src = "With Track\n\
               100, .Sta Central;8.00;8.01\n\
               125, .Stop 1\n\
               150, .Limit 60\n\
               400, .Height 0\n";
    let route = compile_csv(src);
    let mut f = TrackFollower::new(TriggerType::TrainFront, route.rail_gauge);
    let mut ctx = TriggerContext::new();
    for step in 0..=40 {
        f.advance(&route.elements, f64::from(step) * 5.0, true, false, &mut ctx);
        if step * 5 == 130 {
            assert_eq!(f.station_index, Some(0));
        }
    }
    assert_eq!(f.station_index, None);
    assert!((ctx.speed_limit - 60.0 / 3.6).abs() < 1e-6);

    f.advance(&route.elements, 110.0, true, false, &mut ctx);
    assert_eq!(f.station_index, Some(0));
    assert_eq!(ctx.speed_limit, f64::INFINITY);
}

#[test]
fn curved_route_closes_on_itself() {
    // 64 blocks of 25 m make one full circle
    let r = 64.0 * 25.0 / std::f64::consts::TAU;
    let src = format!("With Track\n0, .Curve {r}\n1600, .Curve 0\n");
    let route = compile_csv(&src);
    let p = route.elements[64].world_position;
    assert!(p.x.abs() < 1e-6 && p.z.abs() < 1e-6, "{p:?}");

    let mut f = TrackFollower::new(TriggerType::Camera, route.rail_gauge);
    let mut ctx = TriggerContext::new();
    f.advance(&route.elements, 800.0, true, false, &mut ctx);
    // halfway round, the track runs back along -z at twice the radius
    assert!((f.world_position.x - 2.0 * r).abs() < 1e-6);
    assert!((f.world_direction.z + 1.0).abs() < 1e-9);
}
