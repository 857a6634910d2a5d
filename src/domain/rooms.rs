/// Room and building detection from raw tile data.
///
/// Flood-fills every base-walkable, non-door tile (doors are hard
/// boundaries). Each connected region is then classified:
///
///   indoor  ⇔  bbox area ≤ 25% of the map
///           ∧  wall-adjacent tiles > 30% of the bbox perimeter
///
/// Outdoor clearings fail one test or the other without any explicit room
/// markup. Accepted regions become `Building`s with ids assigned in
/// row-major discovery order, so identical input gives identical ids.

use std::collections::BTreeMap;

use serde::Serialize;

use super::coord::Rect;
use super::tile::TileCode;
use super::tile_world::TileWorld;

const DIRS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// Share of the map a region's bbox may cover and still be a building.
const MAX_AREA_FRACTION: f64 = 0.25;
/// Wall-adjacent tiles needed, as a fraction of the bbox perimeter.
const MIN_WALL_CONTACT: f64 = 0.30;
/// One wall type must exceed this share of contacts to name the material.
const MATERIAL_MAJORITY: f64 = 0.70;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(tag = "kind", content = "tile", rename_all = "snake_case")]
pub enum WallMaterial {
    None,
    Mixed,
    Tile(TileCode),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct BuildingDoor {
    pub x: i32,
    pub y: i32,
    /// Building on the far side, `None` when it opens outdoors.
    pub to_room: Option<usize>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Building {
    pub id: usize,
    pub wall: WallMaterial,
    pub bounds: Rect,
    pub center: (i32, i32),
    pub floor_tiles: usize,
    pub doors: Vec<BuildingDoor>,
}

/// A named rectangle actors wander inside.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RoomRegion {
    pub name: String,
    pub bounds: Rect,
    pub building: Option<usize>,
}

struct Region {
    tiles: Vec<(i32, i32)>,
    bounds: Rect,
}

/// A door contact seen from inside a region: the door tile and the floor
/// tile touching it.
struct Contact {
    door: (i32, i32),
    floor: (i32, i32),
}

pub fn detect_buildings(world: &TileWorld) -> Vec<Building> {
    let (region_of, regions) = flood_regions(world);
    let door_run = label_door_runs(world);
    let w = world.width;
    let map_area = (world.width * world.height) as f64;

    let mut public: Vec<Option<usize>> = vec![None; regions.len()];
    let mut buildings: Vec<Building> = Vec::new();
    let mut contacts: Vec<Vec<Contact>> = Vec::new();

    for (ri, region) in regions.iter().enumerate() {
        if region.bounds.area() as f64 > map_area * MAX_AREA_FRACTION {
            continue;
        }

        let mut wall_adjacent = 0usize;
        let mut materials: BTreeMap<TileCode, usize> = BTreeMap::new();
        let mut seen_runs: Vec<usize> = Vec::new();
        let mut region_contacts = Vec::new();

        for &(x, y) in &region.tiles {
            let mut touches_wall = false;
            for &(dx, dy) in &DIRS {
                let (nx, ny) = (x + dx, y + dy);
                if world.is_wall(nx, ny) {
                    touches_wall = true;
                    if let Some(code) = world.tile_at(nx, ny) {
                        *materials.entry(code).or_insert(0) += 1;
                    }
                } else if world.is_door(nx, ny) {
                    let run = door_run[ny as usize * w + nx as usize];
                    if !seen_runs.contains(&run) {
                        seen_runs.push(run);
                        region_contacts.push(Contact { door: (nx, ny), floor: (x, y) });
                    }
                }
            }
            if touches_wall {
                wall_adjacent += 1;
            }
        }

        if (wall_adjacent as f64) <= region.bounds.perimeter() as f64 * MIN_WALL_CONTACT {
            continue;
        }

        let id = buildings.len();
        public[ri] = Some(id);
        buildings.push(Building {
            id,
            wall: majority_material(&materials),
            bounds: region.bounds,
            center: region.bounds.center(),
            floor_tiles: region.tiles.len(),
            doors: Vec::new(),
        });
        contacts.push(region_contacts);
    }

    // Second pass: resolve what lies on the other side of each door.
    for (b, region_contacts) in buildings.iter_mut().zip(contacts) {
        for c in region_contacts {
            let (dx, dy) = (c.door.0 - c.floor.0, c.door.1 - c.floor.1);
            let (mut ox, mut oy) = c.door;
            while world.is_door(ox, oy) {
                ox += dx;
                oy += dy;
            }
            let to_room = if world.in_bounds(ox, oy) {
                region_of[oy as usize * w + ox as usize].and_then(|r| public[r])
            } else {
                None
            };
            let rep = door_run_origin(world, &door_run, c.door);
            b.doors.push(BuildingDoor { x: rep.0, y: rep.1, to_room });
        }
    }

    buildings
}

/// Static wander regions: explicit ones if the world declares any, else one
/// per building plus an outdoors region covering the whole map.
pub fn room_regions(world: &TileWorld, buildings: &[Building], explicit: &[RoomRegion]) -> Vec<RoomRegion> {
    if !explicit.is_empty() {
        return explicit.to_vec();
    }
    let mut rooms: Vec<RoomRegion> = buildings
        .iter()
        .map(|b| RoomRegion { name: format!("building-{}", b.id), bounds: b.bounds, building: Some(b.id) })
        .collect();
    rooms.push(RoomRegion {
        name: "outdoors".to_string(),
        bounds: Rect::new(0, 0, world.width as i32, world.height as i32),
        building: None,
    });
    rooms
}

/// Smallest region containing (x, y).
pub fn room_at(rooms: &[RoomRegion], x: i32, y: i32) -> Option<&RoomRegion> {
    rooms.iter().filter(|r| r.bounds.contains(x, y)).min_by_key(|r| r.bounds.area())
}

fn majority_material(materials: &BTreeMap<TileCode, usize>) -> WallMaterial {
    let total: usize = materials.values().sum();
    if total == 0 {
        return WallMaterial::None;
    }
    let mut best: Option<(TileCode, usize)> = None;
    for (&code, &n) in materials {
        if best.map_or(true, |(_, m)| n > m) {
            best = Some((code, n));
        }
    }
    match best {
        Some((code, n)) if n as f64 > total as f64 * MATERIAL_MAJORITY => WallMaterial::Tile(code),
        _ => WallMaterial::Mixed,
    }
}

/// Stack-based flood fill over walkable non-door tiles. Returns the region
/// index per tile and the regions in row-major discovery order.
fn flood_regions(world: &TileWorld) -> (Vec<Option<usize>>, Vec<Region>) {
    let (w, h) = (world.width, world.height);
    let mut region_of: Vec<Option<usize>> = vec![None; w * h];
    let mut regions = Vec::new();
    let mut stack: Vec<(i32, i32)> = Vec::with_capacity(256);

    let open = |x: i32, y: i32| world.is_base_walkable(x, y) && !world.is_door(x, y);

    for sy in 0..h as i32 {
        for sx in 0..w as i32 {
            if region_of[sy as usize * w + sx as usize].is_some() || !open(sx, sy) {
                continue;
            }
            let ri = regions.len();
            let mut tiles = Vec::new();
            let (mut x0, mut y0, mut x1, mut y1) = (sx, sy, sx, sy);
            region_of[sy as usize * w + sx as usize] = Some(ri);
            stack.push((sx, sy));
            while let Some((x, y)) = stack.pop() {
                tiles.push((x, y));
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
                for &(dx, dy) in &DIRS {
                    let (nx, ny) = (x + dx, y + dy);
                    if !world.in_bounds(nx, ny) || !open(nx, ny) {
                        continue;
                    }
                    let idx = ny as usize * w + nx as usize;
                    if region_of[idx].is_none() {
                        region_of[idx] = Some(ri);
                        stack.push((nx, ny));
                    }
                }
            }
            tiles.sort_by_key(|&(x, y)| (y, x));
            regions.push(Region { tiles, bounds: Rect::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1) });
        }
    }
    (region_of, regions)
}

/// Label connected runs of door tiles so a multi-tile door counts once.
/// Non-door tiles get `usize::MAX`.
fn label_door_runs(world: &TileWorld) -> Vec<usize> {
    let (w, h) = (world.width, world.height);
    let mut run = vec![usize::MAX; w * h];
    let mut next = 0;
    let mut stack = Vec::new();
    for sy in 0..h as i32 {
        for sx in 0..w as i32 {
            let idx = sy as usize * w + sx as usize;
            if run[idx] != usize::MAX || !world.is_door(sx, sy) {
                continue;
            }
            run[idx] = next;
            stack.push((sx, sy));
            while let Some((x, y)) = stack.pop() {
                for &(dx, dy) in &DIRS {
                    let (nx, ny) = (x + dx, y + dy);
                    if !world.is_door(nx, ny) {
                        continue;
                    }
                    let ni = ny as usize * w + nx as usize;
                    if run[ni] == usize::MAX {
                        run[ni] = next;
                        stack.push((nx, ny));
                    }
                }
            }
            next += 1;
        }
    }
    run
}

/// Row-major first tile of the door run containing `tile`.
fn door_run_origin(world: &TileWorld, run: &[usize], tile: (i32, i32)) -> (i32, i32) {
    let w = world.width;
    let id = run[tile.1 as usize * w + tile.0 as usize];
    let first = run.iter().position(|&r| r == id).unwrap_or(tile.1 as usize * w + tile.0 as usize);
    ((first % w) as i32, (first / w) as i32)
}
