/// Doors: proximity-driven open/close animation over the overlay layer.
///
/// Each door carries an integer `open_amount` in `0..=OPEN_STEPS`.
///   - Someone's feet within `proximity_radius` of the door center:
///     reset the close delay, step `open_amount` up (at most once per
///     `animate_interval` ticks).
///   - Nobody near: count the close delay up; once past the threshold,
///     step `open_amount` down at the same cadence.
///
/// While not fully open, the middle of the span stays blocked; the two ends
/// open first, symmetrically. Blocked tiles are written into the overlay
/// only when `open_amount` actually changes, so the base tile grid is never
/// touched.

use serde::{Deserialize, Serialize};

use crate::config::DoorConfig;
use super::cell::Cell;
use super::coord::CoordKey;
use super::tile::Rgb;
use super::tile_world::TileWorld;

pub const OPEN_STEPS: u32 = 4;

const PANEL_GLYPH_H: char = '▄';
const PANEL_GLYPH_V: char = '▐';

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Span runs along x; blocks a vertical corridor through a horizontal wall.
    Horizontal,
    /// Span runs along y.
    Vertical,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Door {
    pub x: usize,
    pub y: usize,
    pub orientation: Orientation,
    pub length: usize,
    pub color: Rgb,
}

impl Door {
    /// World coordinate of the i-th tile of the span.
    pub fn cell(&self, i: usize) -> (usize, usize) {
        match self.orientation {
            Orientation::Horizontal => (self.x + i, self.y),
            Orientation::Vertical => (self.x, self.y + i),
        }
    }

    /// Center in doubled coordinates (exact for even lengths).
    fn center2(&self) -> (i64, i64) {
        let span = self.length as i64 - 1;
        match self.orientation {
            Orientation::Horizontal => (2 * self.x as i64 + span, 2 * self.y as i64),
            Orientation::Vertical => (2 * self.x as i64, 2 * self.y as i64 + span),
        }
    }

    pub fn center(&self) -> (i32, i32) {
        let (cx, cy) = self.center2();
        ((cx / 2) as i32, (cy / 2) as i32)
    }

    fn is_near(&self, fx: i32, fy: i32, radius: u32) -> bool {
        let (cx, cy) = self.center2();
        let dx = 2 * fx as i64 - cx;
        let dy = 2 * fy as i64 - cy;
        let r2 = 2 * radius as i64;
        dx * dx + dy * dy <= r2 * r2
    }

    fn panel(&self) -> Cell {
        let ch = match self.orientation {
            Orientation::Horizontal => PANEL_GLYPH_H,
            Orientation::Vertical => PANEL_GLYPH_V,
        };
        Cell::new(ch, Some(self.color), None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DoorState {
    pub open_amount: u32,
    pub close_delay: u32,
    since_anim: u32,
    blocked: Vec<usize>,
}

/// Door reached one end of its animation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DoorTransition {
    Opened(usize),
    Closed(usize),
}

/// Span indices still blocked at `open_amount`. Symmetric about the center;
/// empty once fully open.
pub fn blocked_indices(length: usize, open_amount: u32) -> Vec<usize> {
    if open_amount >= OPEN_STEPS {
        return Vec::new();
    }
    let half = (length + 1) / 2;
    let removed = half * open_amount as usize / OPEN_STEPS as usize;
    (removed..length - removed).collect()
}

pub struct DoorSystem {
    pub doors: Vec<Door>,
    pub states: Vec<DoorState>,
    cfg: DoorConfig,
}

impl DoorSystem {
    /// Register door geometry with the world and close every door.
    pub fn new(doors: Vec<Door>, cfg: DoorConfig, world: &mut TileWorld) -> Self {
        let states = doors
            .iter()
            .map(|_| DoorState {
                open_amount: 0,
                close_delay: 0,
                since_anim: cfg.animate_interval,
                blocked: Vec::new(),
            })
            .collect();
        let mut sys = DoorSystem { doors, states, cfg };
        for door in &sys.doors {
            for i in 0..door.length {
                let (x, y) = door.cell(i);
                world.mark_door_cell(x, y);
            }
        }
        sys.reapply(world);
        sys
    }

    /// Rewrite every door's blocked tiles. Needed after an overlay rebuild.
    pub fn reapply(&mut self, world: &mut TileWorld) {
        for i in 0..self.doors.len() {
            self.states[i].blocked.clear();
            self.apply(i, world);
        }
    }

    /// Advance every door by one tick. `feet` are actor foot positions.
    pub fn update(&mut self, feet: &[(i32, i32)], world: &mut TileWorld) -> Vec<DoorTransition> {
        let mut transitions = Vec::new();
        let interval = self.cfg.animate_interval;
        for i in 0..self.doors.len() {
            let door = self.doors[i];
            let near = feet.iter().any(|&(fx, fy)| door.is_near(fx, fy, self.cfg.proximity_radius));
            let st = &mut self.states[i];
            st.since_anim = st.since_anim.saturating_add(1);
            let before = st.open_amount;

            if near {
                st.close_delay = 0;
                if st.open_amount < OPEN_STEPS && st.since_anim >= interval {
                    st.open_amount += 1;
                    st.since_anim = 0;
                }
            } else {
                st.close_delay = st.close_delay.saturating_add(1);
                if st.close_delay > self.cfg.close_delay && st.open_amount > 0 && st.since_anim >= interval {
                    st.open_amount -= 1;
                    st.since_anim = 0;
                }
            }

            if st.open_amount != before {
                let now = st.open_amount;
                self.apply(i, world);
                if now == OPEN_STEPS {
                    transitions.push(DoorTransition::Opened(i));
                } else if now == 0 {
                    transitions.push(DoorTransition::Closed(i));
                }
            }
        }
        transitions
    }

    /// Clear the previous blocked set from the overlay, then write the new one.
    fn apply(&mut self, i: usize, world: &mut TileWorld) {
        let door = self.doors[i];
        let st = &mut self.states[i];
        for &idx in &st.blocked {
            let (x, y) = door.cell(idx);
            world.overlay.remove(CoordKey::pack(x, y));
        }
        st.blocked = blocked_indices(door.length, st.open_amount);
        let panel = door.panel();
        for &idx in &st.blocked {
            let (x, y) = door.cell(idx);
            world.overlay.set(CoordKey::pack(x, y), panel, false);
        }
    }

    pub fn is_open(&self, i: usize) -> bool {
        self.states[i].open_amount >= OPEN_STEPS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{TileDef, TileTable};

    fn cfg() -> DoorConfig {
        DoorConfig { proximity_radius: 4, animate_interval: 3, close_delay: 5 }
    }

    fn corridor() -> TileWorld {
        let mut t = TileTable::new();
        t.insert('.', TileDef::floor('.'));
        let rows: Vec<String> = (0..10).map(|_| ".".repeat(20)).collect();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        TileWorld::from_strs(&refs, t)
    }

    fn door8() -> Door {
        Door { x: 6, y: 5, orientation: Orientation::Horizontal, length: 8, color: Rgb(200, 120, 40) }
    }

    #[test]
    fn blocked_count_strictly_decreases_to_zero() {
        let mut prev = usize::MAX;
        for open in 0..=OPEN_STEPS {
            let b = blocked_indices(8, open);
            assert!(b.len() < prev);
            prev = b.len();
            // symmetric: index i blocked ⇔ index len-1-i blocked
            for &i in &b {
                assert!(b.contains(&(8 - 1 - i)));
            }
        }
        assert_eq!(prev, 0);
    }

    #[test]
    fn odd_length_keeps_center_blocked_longest() {
        assert_eq!(blocked_indices(7, 3), vec![3]);
        assert_eq!(blocked_indices(1, 3), vec![0]);
        assert!(blocked_indices(1, OPEN_STEPS).is_empty());
    }

    #[test]
    fn new_door_blocks_whole_span() {
        let mut w = corridor();
        let sys = DoorSystem::new(vec![door8()], cfg(), &mut w);
        assert!(!sys.is_open(0));
        for x in 6..14 {
            assert!(!w.is_walkable(x, 5));
            assert!(w.is_door(x, 5));
        }
        assert!(w.is_walkable(5, 5));
        assert!(w.is_walkable(14, 5));
    }

    #[test]
    fn approach_opens_within_bound_then_closes_after_delay() {
        let mut w = corridor();
        let mut sys = DoorSystem::new(vec![door8()], cfg(), &mut w);
        let near = [(9, 4)];
        let mut ticks = 0;
        while !sys.is_open(0) {
            sys.update(&near, &mut w);
            ticks += 1;
            assert!(ticks <= OPEN_STEPS * 3);
        }
        for x in 6..14 {
            assert!(w.is_walkable(x, 5));
        }

        let mut closed_at = None;
        for t in 0..100 {
            let tr = sys.update(&[], &mut w);
            if tr.contains(&DoorTransition::Closed(0)) {
                closed_at = Some(t);
                break;
            }
        }
        let closed_at = closed_at.expect("door should close");
        assert!(closed_at > 5);
        assert!(!w.is_walkable(9, 5));
    }

    #[test]
    fn far_actor_does_not_open() {
        let mut w = corridor();
        let mut sys = DoorSystem::new(vec![door8()], cfg(), &mut w);
        for _ in 0..50 {
            sys.update(&[(0, 0)], &mut w);
        }
        assert_eq!(sys.states[0].open_amount, 0);
    }

    #[test]
    fn reapply_restores_panels_after_overlay_rebuild() {
        let mut w = corridor();
        let mut sys = DoorSystem::new(vec![door8()], cfg(), &mut w);
        w.overlay = crate::domain::overlay::Overlay::new();
        assert!(w.is_walkable(9, 5));
        sys.reapply(&mut w);
        assert!(!w.is_walkable(9, 5));
    }
}
