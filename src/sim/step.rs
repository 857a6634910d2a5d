/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Wind strength for this tick
///   2. Behavior (every `behavior_interval` ticks): each actor's state machine
///   3. Door animation from actor foot positions
///   4. Camera follow of the observed actor
///   5. Housekeeping (expire walked-on marks)
///
/// Rendering is not part of the step; the loop decides whether a frame is
/// drawn (it may skip while the output sink is busy).
///
/// Occupancy during behavior uses the live overlay (`can_stand`), so an actor
/// reaching a closed door waits there while the door opens.

use tracing::debug;

use crate::domain::behavior::{BehaviorCtx, StepOutcome};
use crate::domain::door::DoorTransition;
use crate::domain::entity::{FOOTPRINT_WIDTH, FOOT_INSET};
use crate::domain::rooms;
use crate::domain::walkgrid::can_stand;
use super::event::SimEvent;
use super::world::WorldState;

/// How often walked-on marks are pruned.
const PRUNE_INTERVAL: u64 = 64;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState) -> Vec<SimEvent> {
    let mut events: Vec<SimEvent> = Vec::new();
    world.tick += 1;
    world.wind = gust(world.tick, world.cfg.render.wind);

    if world.tick % world.cfg.speed.behavior_interval == 0 {
        resolve_behavior(world, &mut events);
    }
    resolve_doors(world, &mut events);
    resolve_camera(world);

    if world.tick % PRUNE_INTERVAL == 0 {
        world.tiles.prune_walked(world.tick, world.cfg.render.walk_mark_ticks);
    }

    events
}

// ══════════════════════════════════════════════════════════════
// Behavior
// ══════════════════════════════════════════════════════════════

fn resolve_behavior(world: &mut WorldState, events: &mut Vec<SimEvent>) {
    let tick = world.tick;
    for agent in world.agents.iter_mut() {
        let (cx, cy) = agent.actor.foot_center();
        let room = rooms::room_at(&world.rooms, cx, cy).map(|r| r.bounds);
        let before = agent.actor.grid_pos();

        let mut ctx = BehaviorCtx {
            grid: &world.grid,
            pathfinder: &mut world.pathfinder,
            room,
            cfg: &world.cfg.behavior,
            paths: &world.cfg.paths,
        };
        let tiles = &world.tiles;
        let outcome = agent.behavior.step(&mut agent.actor, &mut ctx, |x, y| can_stand(tiles, x, y));

        let (gx, gy) = agent.actor.grid_pos();
        if (gx, gy) != before {
            for tx in gx + FOOT_INSET..gx + FOOTPRINT_WIDTH {
                world.tiles.mark_walked(tx, gy, tick);
            }
        }

        let id = agent.actor.id;
        match outcome {
            StepOutcome::Continue => {}
            StepOutcome::Arrived => events.push(SimEvent::ActorArrived { id, x: gx, y: gy }),
            StepOutcome::GaveUp => {
                debug!(actor = id, x = gx, y = gy, "gave up on blocked walk");
                events.push(SimEvent::ActorGaveUp { id, x: gx, y: gy });
            }
            StepOutcome::BackedOff => {
                debug!(actor = id, "no reachable target, backing off");
                events.push(SimEvent::ActorBackedOff { id });
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Doors
// ══════════════════════════════════════════════════════════════

fn resolve_doors(world: &mut WorldState, events: &mut Vec<SimEvent>) {
    let feet = world.feet();
    for t in world.doors.update(&feet, &mut world.tiles) {
        events.push(match t {
            DoorTransition::Opened(door) => SimEvent::DoorOpened { door },
            DoorTransition::Closed(door) => SimEvent::DoorClosed { door },
        });
    }
}

// ══════════════════════════════════════════════════════════════
// Camera
// ══════════════════════════════════════════════════════════════

fn resolve_camera(world: &mut WorldState) {
    let Some(id) = world.observed else { return };
    let Some(agent) = world.agent(id) else { return };
    let (cx, cy) = agent.actor.foot_center();
    let (w, h) = (world.tiles.width, world.tiles.height);
    world.camera.follow(cx, cy, w, h);
}

// ══════════════════════════════════════════════════════════════
// Wind
// ══════════════════════════════════════════════════════════════

/// Wind strength in `0..=peak`: a slow swell with sharper gusts on top.
pub fn gust(tick: u64, peak: f32) -> f32 {
    let t = (tick % 100_000) as f32;
    let swell = 0.5 + 0.5 * (t * 0.011).sin();
    let burst = (t * 0.047).sin().max(0.0);
    ((0.4 + 0.6 * burst * burst) * swell * peak).clamp(0.0, peak.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::door::OPEN_STEPS;
    use crate::domain::rooms::WallMaterial;
    use crate::sim::level::parse_world;

    const TABLE: &str = r##"
[tiles."."]
glyph = "."
walkable = true

[tiles."#"]
glyph = "#"
"##;

    fn build(map: &[&str], extra: &str, cfg: AppConfig) -> WorldState {
        let text = format!(
            "name = \"fixture\"\nmap = \"\"\"\n{}\n\"\"\"\nspawns = [[0, 0]]\n{TABLE}\n{extra}",
            map.join("\n")
        );
        WorldState::new(parse_world(&text).unwrap(), cfg, 1)
    }

    /// 20×10 walled room (x 0..20, y 0..10) with an 8-tile door in the south
    /// wall at x 6..14, inside a 30×16 yard.
    fn walled_room() -> Vec<String> {
        let mut rows = Vec::new();
        for y in 0..16 {
            let mut row = String::new();
            for x in 0..30 {
                let wall = x < 20
                    && y < 10
                    && (x == 0 || x == 19 || y == 0 || y == 9)
                    && !(y == 9 && (6..14).contains(&x));
                row.push(if wall { '#' } else { '.' });
            }
            rows.push(row);
        }
        rows
    }

    const SOUTH_DOOR: &str = "[[doors]]\nx = 6\ny = 9\norientation = \"horizontal\"\nlength = 8\n";

    #[test]
    fn actor_opens_door_and_walks_through() {
        let rows = walled_room();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let mut cfg = AppConfig::default();
        cfg.behavior.wait_chance_pct = 0;
        let mut w = build(&refs, SOUTH_DOOR, cfg);

        // Door starts closed and blocks the span.
        assert!(!w.tiles.is_walkable(9, 9));
        assert!(w.grid.get(6, 9));

        let id = w.join("ada", 4);
        w.agent_mut(id).unwrap().actor.set_grid_pos(6, 13);
        assert!(w.move_actor(id, 6, 4));

        let bound = (OPEN_STEPS * w.cfg.doors.animate_interval) as u64;
        let mut opened_at = None;
        let mut arrived = false;
        for _ in 0..600 {
            let events = step(&mut w);
            if opened_at.is_none() && events.contains(&SimEvent::DoorOpened { door: 0 }) {
                opened_at = Some(w.tick);
            }
            if w.agent(id).unwrap().actor.grid_pos() == (6, 4) {
                arrived = true;
                break;
            }
        }
        let opened_at = opened_at.expect("door never opened");
        assert!(opened_at <= bound, "opened at tick {opened_at}, bound {bound}");
        assert!(arrived, "actor never got through the door");
    }

    #[test]
    fn door_closes_after_actor_leaves() {
        let rows = walled_room();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let mut w = build(&refs, SOUTH_DOOR, AppConfig::default());
        let id = w.join("ada", 4);
        w.agent_mut(id).unwrap().actor.set_grid_pos(6, 12);
        for _ in 0..40 {
            step(&mut w);
        }
        assert!(w.doors.is_open(0));

        assert!(w.leave(id));
        let mut closed = false;
        for _ in 0..200 {
            if step(&mut w).contains(&SimEvent::DoorClosed { door: 0 }) {
                closed = true;
                break;
            }
        }
        assert!(closed);
        assert!(!w.tiles.is_walkable(9, 9));
    }

    #[test]
    fn single_house_is_one_building_opening_outdoors() {
        // 12×8 house at (10, 6) in a 40×24 field; 2-tile door in the south wall.
        let mut rows = Vec::new();
        for y in 0..24 {
            let mut row = String::new();
            for x in 0..40 {
                let inside_box = (10..22).contains(&x) && (6..14).contains(&y);
                let edge = x == 10 || x == 21 || y == 6 || y == 13;
                let door = y == 13 && (15..17).contains(&x);
                row.push(if inside_box && edge && !door { '#' } else { '.' });
            }
            rows.push(row);
        }
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let door = "[[doors]]\nx = 15\ny = 13\norientation = \"horizontal\"\nlength = 2\n";
        let w = build(&refs, door, AppConfig::default());

        assert_eq!(w.buildings.len(), 1);
        let b = &w.buildings[0];
        assert_eq!(b.wall, WallMaterial::Tile('#'));
        assert_eq!(b.floor_tiles, 60);
        assert_eq!(b.doors.len(), 1);
        assert_eq!(b.doors[0].to_room, None);
        // One region for the house plus the outdoors.
        assert_eq!(w.rooms.len(), 2);
    }

    #[test]
    fn behavior_is_throttled() {
        let rows = walled_room();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let mut cfg = AppConfig::default();
        cfg.speed.behavior_interval = 3;
        cfg.behavior.wait_chance_pct = 0;
        let mut w = build(&refs, "", cfg);
        let id = w.join("ada", 4);
        w.agent_mut(id).unwrap().actor.set_grid_pos(21, 11);
        assert!(w.move_actor(id, 21, 15));
        for _ in 0..6 {
            step(&mut w);
        }
        assert_eq!(w.agent(id).unwrap().actor.grid_pos(), (21, 13));
    }

    #[test]
    fn walking_flattens_ground() {
        let text = r#"
map = """
..............
..............
..............
"""
spawns = [[0, 0]]

[tiles."."]
glyph = "."
walkable = true

[ground."."]
variants = [",", "'"]
flattened = "_"
"#;
        let mut cfg = AppConfig::default();
        cfg.speed.behavior_interval = 1;
        cfg.behavior.wait_chance_pct = 0;
        let mut w = WorldState::new(parse_world(text).unwrap(), cfg, 1);
        let id = w.join("ada", 4);
        assert!(w.move_actor(id, 3, 2));
        for _ in 0..3 {
            step(&mut w);
        }
        let cell = w.tiles.tile_cell(5, 2, w.tick, 0.0, w.cfg.render.walk_mark_ticks);
        assert_eq!(cell.ch, '_');
    }

    #[test]
    fn gust_stays_within_peak() {
        for tick in 0..5000 {
            let g = gust(tick, 0.6);
            assert!((0.0..=0.6).contains(&g));
        }
        assert_eq!(gust(123, 0.0), 0.0);
    }
}
