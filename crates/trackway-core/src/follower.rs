//! Continuous-position cursor over the compiled track.
//!
//! A [`TrackFollower`] belongs to one camera, train or car. Each step it is
//! moved to a new track position with [`TrackFollower::advance`], which walks
//! element boundaries, fires the events crossed on the way and recomputes the
//! world pose. The element array is shared and never mutated.

use crate::element::TrackElement;
use crate::event::{TriggerContext, TriggerType, check_events};
use crate::interpreter::sign;
use crate::math::Vector3;

/// Distance past which a position change counts as a jump.
const ODOMETER_JUMP: f64 = 10.0;

/// Slack when checking events of elements that are stepped over.
const BOUNDARY_SLACK: f64 = 0.01;

/// World pose of a follower.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3,
    pub direction: Vector3,
    pub up: Vector3,
    pub side: Vector3,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackFollower {
    /// Index of the element containing `position`.
    pub last_element: usize,
    pub position: f64,
    pub world_position: Vector3,
    pub world_direction: Vector3,
    pub world_up: Vector3,
    pub world_side: Vector3,
    /// Gradient of the current element in permille.
    pub pitch: f64,
    pub curve_radius: f64,
    pub curve_cant: f64,
    pub adhesion: f64,
    pub rain_intensity: i32,
    pub snow_intensity: i32,
    /// Part of `curve_cant` added by track inaccuracy.
    pub cant_due_to_inaccuracy: f64,
    pub odometer: f64,
    pub trigger: TriggerType,
    pub station_index: Option<usize>,
    pub rail_gauge: f64,
}

impl TrackFollower {
    pub fn new(trigger: TriggerType, rail_gauge: f64) -> Self {
        Self {
            last_element: 0,
            position: 0.0,
            world_position: Vector3::ZERO,
            world_direction: Vector3::FORWARD,
            world_up: Vector3::UP,
            world_side: Vector3::RIGHT,
            pitch: 0.0,
            curve_radius: 0.0,
            curve_cant: 0.0,
            adhesion: 1.0,
            rain_intensity: 0,
            snow_intensity: 0,
            cant_due_to_inaccuracy: 0.0,
            odometer: 0.0,
            trigger,
            station_index: None,
            rail_gauge,
        }
    }

    pub fn world_transform(&self) -> Pose {
        Pose {
            position: self.world_position,
            direction: self.world_direction,
            up: self.world_up,
            side: self.world_side,
        }
    }

    /// Moves to `new_position`, firing every event crossed since the last
    /// call. World coordinates are only recomputed when `update_world` is
    /// set. An empty element slice is a no-op.
    pub fn advance(
        &mut self,
        elements: &[TrackElement],
        new_position: f64,
        update_world: bool,
        add_inaccuracy: bool,
        ctx: &mut TriggerContext,
    ) {
        if elements.is_empty() {
            return;
        }
        let old = self.position;
        let mut i = self.last_element.min(elements.len() - 1);

        // Element 0 is never left backwards; positions before it are
        // handled by the final check.
        while i > 0 && new_position < elements[i].start_position {
            let e = &elements[i];
            check_events(
                &e.events,
                i,
                -1,
                old - e.start_position,
                -BOUNDARY_SLACK,
                self.trigger,
                ctx,
            );
            i -= 1;
        }
        while i + 1 < elements.len() && new_position >= elements[i + 1].start_position {
            let e = &elements[i];
            let length = elements[i + 1].start_position - e.start_position;
            check_events(
                &e.events,
                i,
                1,
                old - e.start_position,
                length + BOUNDARY_SLACK,
                self.trigger,
                ctx,
            );
            i += 1;
        }

        let e = &elements[i];
        let next = elements.get(i + 1);
        let da = old - e.start_position;
        let db = new_position - e.start_position;

        if update_world {
            self.interpolate(e, next, db);
            if add_inaccuracy {
                let (x, y, c) = match next {
                    Some(n) => {
                        let t = blend_factor(e, n, db);
                        let (x1, y1, c1) = inaccuracy(new_position, e.accuracy, self.rail_gauge);
                        let (x2, y2, c2) = inaccuracy(new_position, n.accuracy, self.rail_gauge);
                        (
                            (1.0 - t) * x1 + t * x2,
                            (1.0 - t) * y1 + t * y2,
                            (1.0 - t) * c1 + t * c2,
                        )
                    }
                    None => inaccuracy(new_position, e.accuracy, self.rail_gauge),
                };
                self.world_position += self.world_side * x + self.world_up * y;
                self.curve_cant += c;
                self.cant_due_to_inaccuracy = c;
            } else {
                self.cant_due_to_inaccuracy = 0.0;
            }
        }

        check_events(&e.events, i, sign(db - da) as i32, da, db, self.trigger, ctx);

        if new_position != old {
            let d = new_position - old;
            if d.abs() > ODOMETER_JUMP {
                self.odometer = 0.0;
            } else {
                self.odometer += d;
            }
        }
        self.position = new_position;
        self.last_element = i;
        self.adhesion = e.adhesion;
        self.pitch = e.pitch * 1000.0;
        self.rain_intensity = e.rain_intensity;
        self.snow_intensity = e.snow_intensity;
        self.station_index = ctx.station;
    }

    /// Moves to `position` without firing events.
    pub fn teleport(&mut self, elements: &[TrackElement], position: f64, update_world: bool) {
        let trigger = std::mem::replace(&mut self.trigger, TriggerType::None);
        let mut scratch = TriggerContext::new();
        scratch.station = self.station_index;
        self.advance(elements, position, update_world, false, &mut scratch);
        self.trigger = trigger;
    }

    fn interpolate(&mut self, e: &TrackElement, next: Option<&TrackElement>, db: f64) {
        self.curve_radius = e.curve_radius;
        if db == 0.0 {
            self.world_position = e.world_position;
            self.world_direction = e.world_direction;
            self.world_up = e.world_up;
            self.world_side = e.world_side;
            self.curve_cant = e.curve_cant;
            return;
        }

        if e.curve_radius != 0.0 {
            let r = e.curve_radius;
            let dir = e.world_direction;
            let p = dir.y / (dir.x * dir.x + dir.z * dir.z).sqrt();
            let s = db / (1.0 + p * p).sqrt();
            let h = s * p;
            let b = s / r.abs();
            let c = sign(db) * (2.0 * r * r * (1.0 - b.cos())).max(0.0).sqrt();
            let a = 0.5 * sign(r) * b;
            let (cos, sin) = (a.cos(), -a.sin());
            let mut d = Vector3::new(dir.x, 0.0, dir.z).normalize().rotate_plane(cos, sin);
            self.world_position = e.world_position + Vector3::new(c * d.x, h, c * d.z);
            d = d.rotate_plane(cos, sin);
            self.world_direction = Vector3::new(d.x, p, d.z).normalize();
            self.world_side = e.world_side.rotate_plane((2.0 * a).cos(), -(2.0 * a).sin());
            self.world_up = self.world_direction.cross(self.world_side);
        } else {
            self.world_position = e.world_position + e.world_direction * db;
            self.world_direction = e.world_direction;
            self.world_up = e.world_up;
            self.world_side = e.world_side;
        }

        self.curve_cant = match next {
            Some(n) => {
                let t = blend_factor(e, n, db);
                let (t2, t3) = (t * t, t * t * t);
                (2.0 * t3 - 3.0 * t2 + 1.0) * e.curve_cant
                    + (t3 - 2.0 * t2 + t) * e.curve_cant_tangent
                    + (-2.0 * t3 + 3.0 * t2) * n.curve_cant
                    + (t3 - t2) * n.curve_cant_tangent
            }
            None => e.curve_cant,
        };
    }
}

/// Fraction of the way from `e` to `next`, clamped to `[0, 1]`.
fn blend_factor(e: &TrackElement, next: &TrackElement, db: f64) -> f64 {
    let length = next.start_position - e.start_position;
    if length <= 0.0 {
        return 0.0;
    }
    (db / length).clamp(0.0, 1.0)
}

/// Lateral offset, vertical offset and cant added by track inaccuracy at
/// `position`. Zero when `level` is not positive.
pub fn inaccuracy(position: f64, level: f64, gauge: f64) -> (f64, f64, f64) {
    if level <= 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let z = (0.25 * level).powf(1.2) * position;
    let x = 0.14 * (0.5843 * z).sin() + 0.82 * (0.2246 * z).sin() + 0.55 * (0.1974 * z).sin();
    let y = 0.18 * (0.5172 * z).sin() + 0.37 * (0.3251 * z).sin() + 0.91 * (0.3773 * z).sin();
    let c = 0.23 * (0.3131 * z).sin() + 0.54 * (0.5807 * z).sin() + 0.81 * (0.3621 * z).sin();
    (
        x * 0.0035 * gauge * level,
        y * 0.0020 * gauge * level,
        c * 0.0025 * gauge * level,
    )
}
