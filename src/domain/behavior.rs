/// Per-actor behavior state machine.
///
///   Idle { dwell } ──dwell spent, path found──▶ Walking
///   Walking ──random pause──▶ Waiting { remaining } ──▶ Walking
///   Walking ──last waypoint reached──▶ Idle (gestures cleared)
///   Walking ──blocked `stuck_give_up` ticks in a row──▶ Idle
///
/// One call to [`Behavior::step`] is one behavior tick. Walking moves at
/// most one tile per tick and only along one axis, so a diagonal waypoint
/// costs two ticks. Occupancy is decided by a caller-supplied predicate that
/// sees live door state, unlike the walk grid the paths are planned on.
///
/// A blocked step escalates with the stuck counter:
///   - below `stuck_wait`: stand still (a door is probably mid-open)
///   - at `stuck_wait` and every `stuck_wait` ticks after: replan to the goal
///   - on the `stuck_give_up`-th consecutive blocked tick: drop the walk
///     and go idle

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BehaviorConfig, PathConfig};
use super::coord::Rect;
use super::entity::Actor;
use super::pathfind::{PathQuery, Pathfinder, Point};
use super::walkgrid::WalkGrid;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BehaviorState {
    Idle { dwell: u32 },
    Walking,
    Waiting { remaining: u32 },
}

/// Noteworthy result of one behavior tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepOutcome {
    Continue,
    Arrived,
    GaveUp,
    /// Too many failed target picks in a row; idling longer.
    BackedOff,
}

/// Shared state a behavior tick reads. Built fresh by the caller each tick.
pub struct BehaviorCtx<'a> {
    pub grid: &'a WalkGrid,
    pub pathfinder: &'a mut Pathfinder,
    /// Bounds of the room the actor is standing in; whole map when `None`.
    pub room: Option<Rect>,
    pub cfg: &'a BehaviorConfig,
    pub paths: &'a PathConfig,
}

#[derive(Clone, Debug)]
pub struct Behavior {
    pub state: BehaviorState,
    path: Vec<Point>,
    next: usize,
    goal: Option<Point>,
    /// Goal came from a directive: replans go cross-map.
    directed: bool,
    stuck: u32,
    failures: u32,
    rng: StdRng,
}

impl Behavior {
    pub fn new(seed: u64, cfg: &BehaviorConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let dwell = rng.gen_range(cfg.idle_min..=cfg.idle_max);
        Behavior {
            state: BehaviorState::Idle { dwell },
            path: Vec::new(),
            next: 0,
            goal: None,
            directed: false,
            stuck: 0,
            failures: 0,
            rng,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, BehaviorState::Idle { .. })
    }

    pub fn goal(&self) -> Option<Point> {
        self.goal
    }

    /// Remaining waypoints, next one first.
    pub fn waypoints(&self) -> &[Point] {
        &self.path[self.next.min(self.path.len())..]
    }

    pub fn stuck_ticks(&self) -> u32 {
        self.stuck
    }

    /// Plan a cross-map walk to `goal` (walk-grid coordinates). Returns false
    /// and leaves the state alone when no route exists.
    pub fn move_to(&mut self, actor: &Actor, goal: Point, ctx: &mut BehaviorCtx) -> bool {
        let query = PathQuery {
            start: actor.grid_pos(),
            goal,
            bounds: None,
            budget: ctx.paths.agent_node_budget,
            goal_radius: ctx.paths.goal_search_radius,
        };
        match ctx.pathfinder.find_path(ctx.grid, query) {
            Some(path) => {
                self.begin_walk(goal, path, true, ctx.cfg);
                true
            }
            None => false,
        }
    }

    /// Drop any walk in progress and idle.
    pub fn stop(&mut self, cfg: &BehaviorConfig) {
        self.clear_walk();
        self.state = BehaviorState::Idle { dwell: self.random_dwell(cfg) };
    }

    /// Advance one behavior tick. `can_occupy(x, y)` is the live footprint
    /// check for a walk-grid coordinate.
    pub fn step(
        &mut self,
        actor: &mut Actor,
        ctx: &mut BehaviorCtx,
        can_occupy: impl Fn(i32, i32) -> bool,
    ) -> StepOutcome {
        actor.tick_gestures();
        match self.state {
            BehaviorState::Idle { dwell } => {
                if dwell > 0 {
                    self.state = BehaviorState::Idle { dwell: dwell - 1 };
                    StepOutcome::Continue
                } else {
                    self.pick_target(actor, ctx)
                }
            }
            BehaviorState::Waiting { remaining } => {
                self.state = if remaining > 1 {
                    BehaviorState::Waiting { remaining: remaining - 1 }
                } else {
                    BehaviorState::Walking
                };
                StepOutcome::Continue
            }
            BehaviorState::Walking => self.walk(actor, ctx, can_occupy),
        }
    }

    // ── Idle ──

    fn pick_target(&mut self, actor: &Actor, ctx: &mut BehaviorCtx) -> StepOutcome {
        let start = actor.grid_pos();
        let room = ctx
            .room
            .unwrap_or_else(|| Rect::new(0, 0, ctx.grid.width as i32, ctx.grid.height as i32));

        let mut target = None;
        if room.w > 0 && room.h > 0 {
            for _ in 0..ctx.cfg.target_tries {
                let tx = self.rng.gen_range(room.x..room.x + room.w);
                let ty = self.rng.gen_range(room.y..room.y + room.h);
                if (tx, ty) != start && ctx.grid.get(tx, ty) {
                    target = Some((tx, ty));
                    break;
                }
            }
        }

        let path = target.and_then(|goal| {
            let query = PathQuery {
                start,
                goal,
                bounds: Some(room.expand(ctx.paths.room_padding)),
                budget: ctx.paths.room_node_budget,
                goal_radius: ctx.paths.goal_search_radius,
            };
            ctx.pathfinder.find_path(ctx.grid, query).map(|p| (goal, p))
        });

        match path {
            Some((goal, path)) if !path.is_empty() => {
                self.failures = 0;
                self.begin_walk(goal, path, false, ctx.cfg);
                StepOutcome::Continue
            }
            _ => {
                self.failures += 1;
                if self.failures >= ctx.cfg.max_failures {
                    self.failures = 0;
                    let dwell = self.random_dwell(ctx.cfg).saturating_mul(ctx.cfg.backoff_multiplier);
                    self.state = BehaviorState::Idle { dwell };
                    StepOutcome::BackedOff
                } else {
                    // Try again next tick.
                    self.state = BehaviorState::Idle { dwell: 0 };
                    StepOutcome::Continue
                }
            }
        }
    }

    // ── Walking ──

    fn walk(
        &mut self,
        actor: &mut Actor,
        ctx: &mut BehaviorCtx,
        can_occupy: impl Fn(i32, i32) -> bool,
    ) -> StepOutcome {
        let (ax, ay) = actor.grid_pos();
        let Some(&(wx, wy)) = self.path.get(self.next) else {
            return self.arrive(actor, ctx.cfg);
        };

        let dx = (wx - ax).signum();
        let dy = (wy - ay).signum();
        let mut candidates = [(0, 0); 2];
        let mut n = 0;
        if dx != 0 {
            candidates[n] = (dx, 0);
            n += 1;
        }
        if dy != 0 {
            candidates[n] = (0, dy);
            n += 1;
        }

        let step = candidates[..n]
            .iter()
            .copied()
            .find(|&(sx, sy)| can_occupy(ax + sx, ay + sy));

        let Some((sx, sy)) = step else {
            return self.blocked(actor, ctx);
        };

        actor.set_grid_pos(ax + sx, ay + sy);
        actor.note_step(sx, sy);
        self.stuck = 0;

        if actor.grid_pos() == (wx, wy) {
            self.next += 1;
            if self.next >= self.path.len() {
                return self.arrive(actor, ctx.cfg);
            }
        }

        if self.rng.gen_range(0..100) < ctx.cfg.wait_chance_pct {
            let remaining = self.rng.gen_range(ctx.cfg.wait_min..=ctx.cfg.wait_max).max(1);
            self.state = BehaviorState::Waiting { remaining };
        }
        StepOutcome::Continue
    }

    fn blocked(&mut self, actor: &Actor, ctx: &mut BehaviorCtx) -> StepOutcome {
        self.stuck += 1;
        let cfg = ctx.cfg;

        if self.stuck >= cfg.stuck_give_up {
            self.stop(cfg);
            return StepOutcome::GaveUp;
        }

        let wait = cfg.stuck_wait.max(1);
        if self.stuck >= cfg.stuck_wait && (self.stuck - cfg.stuck_wait) % wait == 0 {
            if let Some(goal) = self.goal {
                let room = ctx.room.filter(|_| !self.directed);
                let query = PathQuery {
                    start: actor.grid_pos(),
                    goal,
                    bounds: room.map(|r| r.expand(ctx.paths.room_padding)),
                    budget: if self.directed {
                        ctx.paths.agent_node_budget
                    } else {
                        ctx.paths.room_node_budget
                    },
                    goal_radius: ctx.paths.goal_search_radius,
                };
                // The stuck counter keeps running across replans.
                if let Some(path) = ctx.pathfinder.find_path(ctx.grid, query) {
                    if path.is_empty() {
                        self.stuck = 0;
                        return self.arrive_without(cfg);
                    }
                    self.path = path;
                    self.next = 0;
                }
            }
        }
        StepOutcome::Continue
    }

    fn arrive(&mut self, actor: &mut Actor, cfg: &BehaviorConfig) -> StepOutcome {
        actor.clear_gestures();
        self.arrive_without(cfg)
    }

    fn arrive_without(&mut self, cfg: &BehaviorConfig) -> StepOutcome {
        self.clear_walk();
        self.state = BehaviorState::Idle { dwell: self.random_dwell(cfg) };
        StepOutcome::Arrived
    }

    // ── Helpers ──

    fn begin_walk(&mut self, goal: Point, path: Vec<Point>, directed: bool, cfg: &BehaviorConfig) {
        self.goal = Some(goal);
        self.directed = directed;
        self.stuck = 0;
        self.next = 0;
        if path.is_empty() {
            self.path.clear();
            self.goal = None;
            self.state = BehaviorState::Idle { dwell: self.random_dwell(cfg) };
        } else {
            self.path = path;
            self.state = BehaviorState::Walking;
        }
    }

    fn clear_walk(&mut self) {
        self.path.clear();
        self.next = 0;
        self.goal = None;
        self.directed = false;
        self.stuck = 0;
    }

    fn random_dwell(&mut self, cfg: &BehaviorConfig) -> u32 {
        self.rng.gen_range(cfg.idle_min..=cfg.idle_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::cell::Cell;
    use crate::domain::coord::CoordKey;
    use crate::domain::entity::GestureKind;
    use crate::domain::tile::{TileDef, TileTable};
    use crate::domain::tile_world::TileWorld;
    use crate::domain::walkgrid::can_stand;

    fn open_world(w: usize, h: usize) -> TileWorld {
        let mut t = TileTable::new();
        t.insert('.', TileDef::floor('.'));
        t.insert('#', TileDef::wall('#'));
        let rows: Vec<String> = (0..h).map(|_| ".".repeat(w)).collect();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        TileWorld::from_strs(&refs, t)
    }

    fn cfgs() -> (BehaviorConfig, PathConfig) {
        let app = AppConfig::default();
        let mut b = app.behavior;
        b.idle_min = 0;
        b.idle_max = 0;
        b.wait_chance_pct = 0;
        (b, app.paths)
    }

    #[test]
    fn directed_walk_arrives_and_clears_gestures() {
        let world = open_world(30, 10);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        actor.toggle_gesture(GestureKind::Talk);
        let mut b = Behavior::new(1, &bcfg);

        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
        assert!(b.move_to(&actor, (12, 7), &mut ctx));
        assert_eq!(b.state, BehaviorState::Walking);

        let mut arrived = false;
        for _ in 0..40 {
            if b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y)) == StepOutcome::Arrived {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        assert_eq!(actor.grid_pos(), (12, 7));
        assert!(!actor.talking);
        assert!(b.is_idle());
    }

    #[test]
    fn one_axis_per_tick() {
        let world = open_world(30, 10);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(1, &bcfg);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
        assert!(b.move_to(&actor, (5, 7), &mut ctx));
        let mut prev = actor.grid_pos();
        for _ in 0..20 {
            let out = b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y));
            let now = actor.grid_pos();
            assert!((now.0 - prev.0).abs() + (now.1 - prev.1).abs() <= 1);
            prev = now;
            if out == StepOutcome::Arrived {
                break;
            }
        }
        assert_eq!(prev, (5, 7));
    }

    #[test]
    fn gives_up_after_twenty_blocked_ticks() {
        let world = open_world(30, 10);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(1, &bcfg);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
        assert!(b.move_to(&actor, (10, 2), &mut ctx));

        for tick in 1..=20 {
            let out = b.step(&mut actor, &mut ctx, |_, _| false);
            if tick < 20 {
                assert_ne!(out, StepOutcome::GaveUp, "gave up early on tick {tick}");
                assert_eq!(b.state, BehaviorState::Walking);
            } else {
                assert_eq!(out, StepOutcome::GaveUp);
            }
        }
        assert!(b.is_idle());
        assert!(b.goal().is_none());
        assert_eq!(actor.grid_pos(), (0, 2));
    }

    #[test]
    fn replans_around_obstacle_after_stuck_wait() {
        let mut world = open_world(30, 10);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(1, &bcfg);

        // Planned across an empty row; the crate lands afterwards.
        let before = WalkGrid::build(&world);
        {
            let mut ctx = BehaviorCtx { grid: &before, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
            assert!(b.move_to(&actor, (20, 2), &mut ctx));
        }
        world.overlay.set(CoordKey::pack(12, 2), Cell::new('c', None, None), false);
        let grid = WalkGrid::build(&world);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };

        let mut replanned_at = None;
        let mut arrived = false;
        for _ in 0..120 {
            let pos = actor.grid_pos();
            let route = b.waypoints().to_vec();
            let out = b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y));
            if out == StepOutcome::Arrived {
                arrived = true;
                break;
            }
            if replanned_at.is_none() && actor.grid_pos() == pos && b.waypoints() != route.as_slice() {
                replanned_at = Some(b.stuck_ticks());
            }
        }
        assert_eq!(replanned_at, Some(bcfg.stuck_wait));
        assert!(arrived);
        assert_eq!(actor.grid_pos(), (20, 2));
    }

    #[test]
    fn short_blockage_only_waits() {
        let world = open_world(30, 10);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(1, &bcfg);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
        assert!(b.move_to(&actor, (10, 2), &mut ctx));
        for _ in 0..5 {
            b.step(&mut actor, &mut ctx, |_, _| false);
        }
        assert_eq!(b.state, BehaviorState::Walking);
        assert_eq!(b.stuck_ticks(), 5);
        b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y));
        assert_eq!(b.stuck_ticks(), 0);
        assert_eq!(actor.grid_pos(), (1, 2));
    }

    #[test]
    fn idle_picks_target_inside_room() {
        let world = open_world(40, 20);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let room = Rect::new(10, 5, 12, 8);
        let mut actor = Actor::new(1, "ada", 3, 12, 4);
        let mut b = Behavior::new(42, &bcfg);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: Some(room), cfg: &bcfg, paths: &pcfg };
        b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y));
        assert_eq!(b.state, BehaviorState::Walking);
        let goal = b.goal().unwrap();
        assert!(room.contains(goal.0, goal.1));
    }

    #[test]
    fn backs_off_after_repeated_failures() {
        // Nowhere to stand: every target pick fails.
        let mut t = TileTable::new();
        t.insert('#', TileDef::wall('#'));
        let rows: Vec<String> = (0..6).map(|_| "#".repeat(12)).collect();
        let refs: Vec<&str> = rows.iter().map(|s| s.as_str()).collect();
        let world = TileWorld::from_strs(&refs, t);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (mut bcfg, pcfg) = cfgs();
        bcfg.idle_min = 5;
        bcfg.idle_max = 5;
        let mut actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(7, &bcfg);
        b.state = BehaviorState::Idle { dwell: 0 };
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };

        let outs: Vec<StepOutcome> =
            (0..3).map(|_| b.step(&mut actor, &mut ctx, |_, _| false)).collect();
        assert_eq!(outs, vec![StepOutcome::Continue, StepOutcome::Continue, StepOutcome::BackedOff]);
        assert_eq!(b.state, BehaviorState::Idle { dwell: 5 * bcfg.backoff_multiplier });
    }

    #[test]
    fn stop_returns_to_idle() {
        let world = open_world(30, 10);
        let grid = WalkGrid::build(&world);
        let mut pf = Pathfinder::new();
        let (bcfg, pcfg) = cfgs();
        let actor = Actor::new(1, "ada", 3, 0, 0);
        let mut b = Behavior::new(1, &bcfg);
        let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
        assert!(b.move_to(&actor, (10, 2), &mut ctx));
        b.stop(&bcfg);
        assert!(b.is_idle());
        assert!(b.waypoints().is_empty());
        assert!(b.goal().is_none());
    }

    #[test]
    fn same_seed_same_choices() {
        let world = open_world(40, 20);
        let grid = WalkGrid::build(&world);
        let (bcfg, pcfg) = cfgs();
        let run = || {
            let mut pf = Pathfinder::new();
            let mut actor = Actor::new(1, "ada", 3, 5, 5);
            let mut b = Behavior::new(99, &bcfg);
            let mut ctx = BehaviorCtx { grid: &grid, pathfinder: &mut pf, room: None, cfg: &bcfg, paths: &pcfg };
            for _ in 0..60 {
                b.step(&mut actor, &mut ctx, |x, y| can_stand(&world, x, y));
            }
            actor.grid_pos()
        };
        assert_eq!(run(), run());
    }
}
