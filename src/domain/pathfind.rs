// A* over the walk grid.
//
// 4-directional moves, unit cost, Manhattan heuristic (admissible and
// consistent on this grid). The open set is a `BinaryHeap` with reversed
// ordering for min-heap behaviour; ties break on lower h, then lower cell
// index, so results are deterministic.
//
// Searches are clipped to an optional bounds rectangle (a room expanded by
// some padding) and capped by a node budget; exceeding the budget reports
// "unreachable" instead of exploring the whole map.
//
// Scratch arrays are generation-stamped and reused across calls. That is
// only sound because the simulation loop is single-threaded; concurrent
// searches each need their own `Pathfinder`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::coord::Rect;
use super::walkgrid::WalkGrid;

const DIRS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

pub type Point = (i32, i32);

#[derive(Clone, Copy, Debug)]
pub struct PathQuery {
    pub start: Point,
    pub goal: Point,
    pub bounds: Option<Rect>,
    pub budget: usize,
    /// Ring radius searched for a walkable stand-in when the goal is blocked.
    pub goal_radius: i32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f: u32,
    h: u32,
    idx: u32,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: smallest f is "greatest".
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct Pathfinder {
    generation: u32,
    seen: Vec<u32>,
    closed: Vec<u32>,
    g: Vec<u32>,
    parent: Vec<u32>,
    open: BinaryHeap<OpenNode>,
    /// Nodes expanded by the last search.
    pub last_expanded: usize,
}

impl Pathfinder {
    pub fn new() -> Self {
        Pathfinder {
            generation: 0,
            seen: Vec::new(),
            closed: Vec::new(),
            g: Vec::new(),
            parent: Vec::new(),
            open: BinaryHeap::with_capacity(256),
            last_expanded: 0,
        }
    }

    fn prepare(&mut self, cells: usize) {
        if self.seen.len() != cells {
            self.seen = vec![0; cells];
            self.closed = vec![0; cells];
            self.g = vec![0; cells];
            self.parent = vec![0; cells];
            self.generation = 0;
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            // Wrapped: stale stamps could alias the new generation.
            self.seen.fill(0);
            self.closed.fill(0);
            self.generation = 1;
        }
        self.open.clear();
        self.last_expanded = 0;
    }

    /// Waypoints from `start` (exclusive) to goal (inclusive), collinear
    /// interior points removed. `Some(vec![])` when already there, `None`
    /// when unreachable or over budget.
    pub fn find_path(&mut self, grid: &WalkGrid, q: PathQuery) -> Option<Vec<Point>> {
        if q.start == q.goal {
            return Some(Vec::new());
        }
        if !grid.in_bounds(q.start.0, q.start.1) {
            return None;
        }
        let goal = if grid.get(q.goal.0, q.goal.1) {
            q.goal
        } else {
            nearest_walkable(grid, q.goal, q.goal_radius)?
        };
        if goal == q.start {
            return Some(Vec::new());
        }
        if let Some(b) = q.bounds {
            if !b.contains(goal.0, goal.1) {
                return None;
            }
        }

        self.prepare(grid.width * grid.height);
        let stamp = self.generation;
        let start_idx = grid.index(q.start.0, q.start.1);
        let goal_idx = grid.index(goal.0, goal.1);

        self.seen[start_idx] = stamp;
        self.g[start_idx] = 0;
        self.parent[start_idx] = start_idx as u32;
        let h0 = manhattan(q.start, goal);
        self.open.push(OpenNode { f: h0, h: h0, idx: start_idx as u32 });

        while let Some(node) = self.open.pop() {
            let ci = node.idx as usize;
            if ci == goal_idx {
                return Some(self.reconstruct(grid, start_idx, goal_idx));
            }
            if self.closed[ci] == stamp {
                continue;
            }
            self.closed[ci] = stamp;
            self.last_expanded += 1;
            if self.last_expanded > q.budget {
                return None;
            }

            let cx = (ci % grid.width) as i32;
            let cy = (ci / grid.width) as i32;
            let cg = self.g[ci];
            for &(dx, dy) in &DIRS {
                let (nx, ny) = (cx + dx, cy + dy);
                if !grid.get(nx, ny) {
                    continue;
                }
                if let Some(b) = q.bounds {
                    if !b.contains(nx, ny) {
                        continue;
                    }
                }
                let ni = grid.index(nx, ny);
                if self.closed[ni] == stamp {
                    continue;
                }
                let tentative = cg + 1;
                if self.seen[ni] != stamp || tentative < self.g[ni] {
                    self.seen[ni] = stamp;
                    self.g[ni] = tentative;
                    self.parent[ni] = ci as u32;
                    let h = manhattan((nx, ny), goal);
                    self.open.push(OpenNode { f: tentative + h, h, idx: ni as u32 });
                }
            }
        }
        None
    }

    fn reconstruct(&self, grid: &WalkGrid, start_idx: usize, goal_idx: usize) -> Vec<Point> {
        let mut raw = Vec::new();
        let mut i = goal_idx;
        loop {
            raw.push(((i % grid.width) as i32, (i / grid.width) as i32));
            if i == start_idx {
                break;
            }
            i = self.parent[i] as usize;
        }
        raw.reverse();
        simplify(&raw)
    }
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn manhattan(a: Point, b: Point) -> u32 {
    ((a.0 - b.0).abs() + (a.1 - b.1).abs()) as u32
}

/// Drop interior points whose incoming and outgoing steps match. `raw`
/// starts at the start tile, which is not part of the result.
pub fn simplify(raw: &[Point]) -> Vec<Point> {
    let mut out = Vec::new();
    if raw.len() < 2 {
        return out;
    }
    for i in 1..raw.len() - 1 {
        let din = (raw[i].0 - raw[i - 1].0, raw[i].1 - raw[i - 1].1);
        let dout = (raw[i + 1].0 - raw[i].0, raw[i + 1].1 - raw[i].1);
        if din != dout {
            out.push(raw[i]);
        }
    }
    out.push(raw[raw.len() - 1]);
    out
}

/// Closest walkable cell on expanding square rings around `p`.
pub fn nearest_walkable(grid: &WalkGrid, p: Point, max_radius: i32) -> Option<Point> {
    for r in 1..=max_radius {
        let mut best: Option<(u32, Point)> = None;
        for dy in -r..=r {
            for dx in -r..=r {
                if dx.abs() != r && dy.abs() != r {
                    continue;
                }
                let c = (p.0 + dx, p.1 + dy);
                if grid.get(c.0, c.1) {
                    let d = manhattan(p, c);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, c));
                    }
                }
            }
        }
        if let Some((_, c)) = best {
            return Some(c);
        }
    }
    None
}
