/// WorldState: the complete simulation context of a running town.
///
/// ## Layers
///   - `tiles`     — the loaded tile grid plus overlay (furniture, door panels)
///   - `doors`     — door animation state; writes panels into the overlay
///   - `grid`      — precomputed walk grid, rebuilt only on structural change
///   - `buildings` / `rooms` — detected once at load; static afterwards
///
/// Everything is owned here and mutated only from the simulation loop.
/// Structural mutation (`place_object`) must happen between ticks.
///
/// ## Camera / Viewport
///
/// World coordinates and screen coordinates are separate:
///   - `camera` — viewport into the world (top-left corner + size)
///   - The camera follows the observed actor with a dead-zone approach
///   - Maps smaller than the viewport are centered

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AppConfig;
use crate::domain::behavior::{Behavior, BehaviorCtx};
use crate::domain::camera::Camera;
use crate::domain::coord::Rect;
use crate::domain::door::DoorSystem;
use crate::domain::entity::{Actor, ActorId};
use crate::domain::overlay::{ObjectDef, Overlay, Placement};
use crate::domain::pathfind::Pathfinder;
use crate::domain::rooms::{self, Building, RoomRegion};
use crate::domain::tile_world::TileWorld;
use crate::domain::walkgrid::WalkGrid;
use crate::sim::level::WorldDef;

const NAMES: [&str; 16] = [
    "Ada", "Basil", "Cleo", "Dara", "Emil", "Faye", "Gus", "Hana",
    "Ivo", "Juno", "Kit", "Lior", "Mira", "Nico", "Oona", "Pax",
];

/// An actor and the state machine driving it.
#[derive(Clone, Debug)]
pub struct Agent {
    pub actor: Actor,
    pub behavior: Behavior,
}

pub struct WorldState {
    pub name: String,
    pub cfg: AppConfig,
    pub tiles: TileWorld,
    pub doors: DoorSystem,
    pub buildings: Vec<Building>,
    pub rooms: Vec<RoomRegion>,
    pub grid: WalkGrid,
    pub pathfinder: Pathfinder,
    pub agents: Vec<Agent>,
    pub camera: Camera,
    /// Actor the camera follows and the keyboard drives.
    pub observed: Option<ActorId>,
    pub tick: u64,
    /// Wind strength for the current tick.
    pub wind: f32,
    objects: HashMap<String, ObjectDef>,
    placements: Vec<Placement>,
    spawns: Vec<(i32, i32)>,
    next_spawn: usize,
    next_id: ActorId,
    rng: StdRng,
}

impl WorldState {
    /// Assemble the simulation from a validated world description.
    pub fn new(def: WorldDef, cfg: AppConfig, seed: u64) -> Self {
        let mut tiles = TileWorld::new(&def.rows, def.table);
        tiles.overlay = Overlay::build(&def.placements, &def.objects);
        let doors = DoorSystem::new(def.doors, cfg.doors.clone(), &mut tiles);
        let buildings = rooms::detect_buildings(&tiles);
        let rooms = rooms::room_regions(&tiles, &buildings, &def.rooms);
        let grid = WalkGrid::build(&tiles);
        let camera = Camera::new(cfg.render.scale);

        WorldState {
            name: def.name,
            cfg,
            tiles,
            doors,
            buildings,
            rooms,
            grid,
            pathfinder: Pathfinder::new(),
            agents: Vec::new(),
            camera,
            observed: None,
            tick: 0,
            wind: 0.0,
            objects: def.objects,
            placements: def.placements,
            spawns: def.spawns,
            next_spawn: 0,
            next_id: 1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    // ── Actors ──

    /// Spawn `count` townsfolk with generated names and appearance seeds.
    pub fn populate(&mut self, count: usize) {
        for i in 0..count {
            let name = NAMES[i % NAMES.len()];
            let seed = self.rng.gen();
            self.join(name, seed);
        }
    }

    /// Add an actor at the next spawn point (round robin). The first actor
    /// to join becomes the observed one.
    pub fn join(&mut self, name: &str, seed: u64) -> ActorId {
        let id = self.next_id;
        self.next_id += 1;
        let (x, y) = self.spawns[self.next_spawn % self.spawns.len()];
        self.next_spawn += 1;

        let actor = Actor::new(id, name, seed, x, y);
        let behavior = Behavior::new(seed ^ (id as u64).rotate_left(32), &self.cfg.behavior);
        self.agents.push(Agent { actor, behavior });
        if self.observed.is_none() {
            self.observed = Some(id);
        }
        id
    }

    /// Remove an actor. Returns false for an unknown id.
    pub fn leave(&mut self, id: ActorId) -> bool {
        let Some(idx) = self.agents.iter().position(|a| a.actor.id == id) else {
            return false;
        };
        self.agents.remove(idx);
        if self.observed == Some(id) {
            self.observed = self.agents.first().map(|a| a.actor.id);
        }
        true
    }

    pub fn agent(&self, id: ActorId) -> Option<&Agent> {
        self.agents.iter().find(|a| a.actor.id == id)
    }

    pub fn agent_mut(&mut self, id: ActorId) -> Option<&mut Agent> {
        self.agents.iter_mut().find(|a| a.actor.id == id)
    }

    /// Cycle the observed actor in join order.
    pub fn observe_next(&mut self) {
        if self.agents.is_empty() {
            self.observed = None;
            return;
        }
        let idx = self
            .observed
            .and_then(|id| self.agents.iter().position(|a| a.actor.id == id))
            .map_or(0, |i| (i + 1) % self.agents.len());
        self.observed = Some(self.agents[idx].actor.id);
    }

    /// Most recently joined actor, if any.
    pub fn newest(&self) -> Option<ActorId> {
        self.agents.last().map(|a| a.actor.id)
    }

    /// Plan a cross-map walk for `id` to walk-grid coordinate (x, y).
    /// Returns false for unknown actors or unreachable goals.
    pub fn move_actor(&mut self, id: ActorId, x: i32, y: i32) -> bool {
        let Some(agent) = self.agents.iter_mut().find(|a| a.actor.id == id) else {
            return false;
        };
        let mut ctx = BehaviorCtx {
            grid: &self.grid,
            pathfinder: &mut self.pathfinder,
            room: None,
            cfg: &self.cfg.behavior,
            paths: &self.cfg.paths,
        };
        agent.behavior.move_to(&agent.actor, (x, y), &mut ctx)
    }

    // ── Rooms ──

    /// Bounds of the smallest room containing (x, y).
    pub fn room_bounds_at(&self, x: i32, y: i32) -> Option<Rect> {
        rooms::room_at(&self.rooms, x, y).map(|r| r.bounds)
    }

    // ── Structure ──

    /// Place an object between ticks, then rebuild the overlay and walk grid.
    /// Returns false for an unknown kind, a placement past the map edge, or
    /// one covering a door tile.
    pub fn place_object(&mut self, kind: &str, x: usize, y: usize) -> bool {
        let Some(def) = self.objects.get(kind) else {
            return false;
        };
        let (Some(end_x), Some(end_y)) = (x.checked_add(def.width), y.checked_add(def.height)) else {
            return false;
        };
        if end_x > self.tiles.width || end_y > self.tiles.height {
            return false;
        }
        let on_door = (y..end_y).any(|ty| (x..end_x).any(|tx| self.tiles.is_door(tx as i32, ty as i32)));
        if on_door {
            return false;
        }
        self.placements.push(Placement { kind: kind.to_string(), x, y });
        self.rebuild_structure();
        true
    }

    fn rebuild_structure(&mut self) {
        self.tiles.overlay.rebuild(&self.placements, &self.objects);
        self.doors.reapply(&mut self.tiles);
        self.grid = WalkGrid::build(&self.tiles);
    }

    /// Foot positions of every actor, for door proximity.
    pub fn feet(&self) -> Vec<(i32, i32)> {
        self.agents.iter().map(|a| a.actor.foot_center()).collect()
    }
}
