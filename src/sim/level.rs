/// World loader.
///
/// ## Sources (priority order):
///   1. `general.world_file` from config.toml
///   2. Built-in embedded world (`worlds/commons.toml`)
///
/// ## World format (TOML):
///   ```toml
///   name = "Commons"
///   map = """
///   ,,,,,,,,,,
///   ,########,
///   ,#......#,
///   ,###==###,
///   """
///   spawns = [[1, 6]]
///
///   [tiles.","]
///   glyph = ","
///   fg = [90, 150, 60]
///   walkable = true
///
///   [ground.","]
///   variants = [",", "'", "\""]
///   flattened = "."
///
///   [objects.table]
///   glyph = "▀"
///   width = 4
///   height = 1
///
///   [[placements]]
///   kind = "table"
///   x = 3
///   y = 2
///
///   [[doors]]
///   x = 4
///   y = 3
///   orientation = "horizontal"
///   length = 2
///   color = [150, 100, 60]
///   ```
///
/// Every check happens here. Once `load_world` returns `Ok`, the simulation
/// may index tiles, doors and spawns without further bounds checks.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::coord::{Rect, MAX_MAP_WIDTH};
use crate::domain::door::{Door, Orientation};
use crate::domain::entity::SPRITE_HEIGHT;
use crate::domain::overlay::{ObjectDef, Placement};
use crate::domain::rooms::RoomRegion;
use crate::domain::tile::{GroundVariation, Rgb, TileCode, TileDef, TileTable};

const EMBEDDED_WORLD: &str = include_str!("../../worlds/commons.toml");

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read world file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("world file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("world map is empty")]
    EmptyMap,
    #[error("map row {row} is {got} tiles wide, expected {expected}")]
    RaggedRow { row: usize, got: usize, expected: usize },
    #[error("map is {0} tiles wide; it must be under {max}", max = MAX_MAP_WIDTH)]
    TooWide(usize),
    #[error("tile key {0:?} must be exactly one character")]
    BadTileKey(String),
    #[error("unknown tile code {code:?} at ({x}, {y})")]
    UnknownTile { code: TileCode, x: usize, y: usize },
    #[error("ground variation declared for undefined tile {0:?}")]
    UnknownGround(String),
    #[error("door {index} at ({x}, {y}) with length {length} leaves the map")]
    DoorOutOfBounds { index: usize, x: usize, y: usize, length: usize },
    #[error("door {index} covers a wall tile at ({x}, {y})")]
    DoorOverWall { index: usize, x: usize, y: usize },
    #[error("placement {index} ({kind:?}) covers door tile ({x}, {y})")]
    ObjectOnDoor { index: usize, kind: String, x: usize, y: usize },
    #[error("placement {index} uses unknown object kind {kind:?}")]
    UnknownObject { index: usize, kind: String },
    #[error("placement {index} ({kind:?} at ({x}, {y})) extends past the map edge")]
    ObjectOutOfBounds { index: usize, kind: String, x: usize, y: usize },
    #[error("spawn point {index} at ({x}, {y}) is out of bounds")]
    SpawnOutOfBounds { index: usize, x: i32, y: i32 },
    #[error("world has no spawn points")]
    NoSpawns,
    #[error("room {0:?} does not overlap the map or its extent overflows")]
    RoomOutOfBounds(String),
}

/// Validated world description, ready to be turned into a `WorldState`.
#[derive(Clone, Debug)]
pub struct WorldDef {
    pub name: String,
    pub rows: Vec<Vec<TileCode>>,
    pub table: TileTable,
    pub objects: HashMap<String, ObjectDef>,
    pub placements: Vec<Placement>,
    pub doors: Vec<Door>,
    /// Sprite top-left positions.
    pub spawns: Vec<(i32, i32)>,
    /// Explicit room regions; empty means "derive from buildings".
    pub rooms: Vec<RoomRegion>,
}

impl WorldDef {
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }
}

// ══════════════════════════════════════════════════════════════
// TOML schema
// ══════════════════════════════════════════════════════════════

#[derive(Deserialize, Debug)]
struct TomlWorld {
    #[serde(default = "default_name")]
    name: String,
    map: String,
    #[serde(default)]
    tiles: HashMap<String, TomlTile>,
    #[serde(default)]
    ground: HashMap<String, TomlGround>,
    #[serde(default)]
    objects: HashMap<String, TomlObject>,
    #[serde(default)]
    placements: Vec<TomlPlacement>,
    #[serde(default)]
    doors: Vec<TomlDoor>,
    #[serde(default)]
    spawns: Vec<[i32; 2]>,
    #[serde(default)]
    rooms: Vec<TomlRoom>,
}

#[derive(Deserialize, Debug)]
struct TomlTile {
    glyph: char,
    #[serde(default)]
    fg: Option<Rgb>,
    #[serde(default)]
    bg: Option<Rgb>,
    #[serde(default)]
    walkable: bool,
    #[serde(default)]
    wall: Option<bool>,
    #[serde(default)]
    door: bool,
}

#[derive(Deserialize, Debug)]
struct TomlGround {
    variants: Vec<char>,
    flattened: char,
}

#[derive(Deserialize, Debug)]
struct TomlObject {
    glyph: char,
    #[serde(default)]
    fg: Option<Rgb>,
    #[serde(default)]
    bg: Option<Rgb>,
    #[serde(default)]
    walkable: bool,
    #[serde(default = "one")]
    width: usize,
    #[serde(default = "one")]
    height: usize,
}

#[derive(Deserialize, Debug)]
struct TomlPlacement {
    kind: String,
    x: usize,
    y: usize,
}

#[derive(Deserialize, Debug)]
struct TomlDoor {
    x: usize,
    y: usize,
    orientation: Orientation,
    length: usize,
    #[serde(default = "default_door_color")]
    color: Rgb,
}

#[derive(Deserialize, Debug)]
struct TomlRoom {
    name: String,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

fn default_name() -> String { "Untitled".to_string() }
fn one() -> usize { 1 }
fn default_door_color() -> Rgb { Rgb(150, 100, 60) }

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Load the configured world file, or the embedded world when none is set.
pub fn load_world(path: Option<&Path>) -> Result<WorldDef, LoadError> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).map_err(|source| LoadError::Io {
                path: p.to_path_buf(),
                source,
            })?;
            parse_world(&text)
        }
        None => parse_world(EMBEDDED_WORLD),
    }
}

/// Parse and validate a world document.
pub fn parse_world(text: &str) -> Result<WorldDef, LoadError> {
    let raw: TomlWorld = toml::from_str(text)?;

    let rows = parse_map(&raw.map)?;
    let width = rows[0].len();
    let height = rows.len();

    let mut table = TileTable::new();
    for (key, t) in &raw.tiles {
        let code = single_char(key).ok_or_else(|| LoadError::BadTileKey(key.clone()))?;
        table.insert(
            code,
            TileDef {
                glyph: t.glyph,
                fg: t.fg,
                bg: t.bg,
                walkable: t.walkable,
                wall: t.wall.unwrap_or(!t.walkable && !t.door),
                door: t.door,
            },
        );
    }
    for (key, g) in raw.ground {
        let code = single_char(&key).ok_or_else(|| LoadError::BadTileKey(key.clone()))?;
        if !table.contains(code) {
            return Err(LoadError::UnknownGround(key));
        }
        table.set_ground(code, GroundVariation { variants: g.variants, flattened: g.flattened });
    }

    for (y, row) in rows.iter().enumerate() {
        for (x, &code) in row.iter().enumerate() {
            if !table.contains(code) {
                return Err(LoadError::UnknownTile { code, x, y });
            }
        }
    }

    let objects: HashMap<String, ObjectDef> = raw
        .objects
        .into_iter()
        .map(|(kind, o)| {
            let def = ObjectDef {
                glyph: o.glyph,
                fg: o.fg,
                bg: o.bg,
                walkable: o.walkable,
                width: o.width.max(1),
                height: o.height.max(1),
            };
            (kind, def)
        })
        .collect();

    let mut doors = Vec::with_capacity(raw.doors.len());
    let mut door_cells = HashSet::new();
    for (index, d) in raw.doors.into_iter().enumerate() {
        let out_of_bounds = LoadError::DoorOutOfBounds { index, x: d.x, y: d.y, length: d.length };
        let end = match d.orientation {
            Orientation::Horizontal => d.x.checked_add(d.length).zip(d.y.checked_add(1)),
            Orientation::Vertical => d.x.checked_add(1).zip(d.y.checked_add(d.length)),
        };
        let Some((end_x, end_y)) = end else { return Err(out_of_bounds) };
        if d.length == 0 || end_x > width || end_y > height {
            return Err(out_of_bounds);
        }
        let door = Door { x: d.x, y: d.y, orientation: d.orientation, length: d.length, color: d.color };
        for i in 0..door.length {
            let (x, y) = door.cell(i);
            let passable = table.get(rows[y][x]).map_or(false, |t| t.walkable || t.door);
            if !passable {
                return Err(LoadError::DoorOverWall { index, x, y });
            }
            door_cells.insert((x, y));
        }
        doors.push(door);
    }

    let mut placements = Vec::with_capacity(raw.placements.len());
    for (index, p) in raw.placements.into_iter().enumerate() {
        let Some(def) = objects.get(&p.kind) else {
            return Err(LoadError::UnknownObject { index, kind: p.kind });
        };
        let fits = match (p.x.checked_add(def.width), p.y.checked_add(def.height)) {
            (Some(end_x), Some(end_y)) => end_x <= width && end_y <= height,
            _ => false,
        };
        if !fits {
            return Err(LoadError::ObjectOutOfBounds { index, kind: p.kind, x: p.x, y: p.y });
        }
        let on_door = (p.y..p.y + def.height)
            .flat_map(|y| (p.x..p.x + def.width).map(move |x| (x, y)))
            .find(|cell| door_cells.contains(cell));
        if let Some((x, y)) = on_door {
            return Err(LoadError::ObjectOnDoor { index, kind: p.kind, x, y });
        }
        placements.push(Placement { kind: p.kind, x: p.x, y: p.y });
    }

    if raw.spawns.is_empty() {
        return Err(LoadError::NoSpawns);
    }
    let mut spawns = Vec::with_capacity(raw.spawns.len());
    for (index, [x, y]) in raw.spawns.into_iter().enumerate() {
        let fits = match y.checked_add(SPRITE_HEIGHT - 1) {
            Some(foot) => x >= 0 && y >= 0 && (x as usize) < width && (foot as usize) < height,
            None => false,
        };
        if !fits {
            return Err(LoadError::SpawnOutOfBounds { index, x, y });
        }
        spawns.push((x, y));
    }

    let map = Rect::new(0, 0, width as i32, height as i32);
    let mut rooms = Vec::with_capacity(raw.rooms.len());
    for r in raw.rooms {
        let ends = r.x.checked_add(r.w).zip(r.y.checked_add(r.h));
        let clipped = match ends {
            Some((end_x, end_y)) if r.w > 0 && r.h > 0 => {
                let (x0, y0) = (r.x.max(0), r.y.max(0));
                let (x1, y1) = (end_x.min(map.w), end_y.min(map.h));
                (x0 < x1 && y0 < y1).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
            }
            _ => None,
        };
        let Some(bounds) = clipped else {
            return Err(LoadError::RoomOutOfBounds(r.name));
        };
        rooms.push(RoomRegion { name: r.name, bounds, building: None });
    }

    Ok(WorldDef {
        name: raw.name,
        rows,
        table,
        objects,
        placements,
        doors,
        spawns,
        rooms,
    })
}

// ══════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════

/// Split the map string into rows of codes. Leading and trailing blank
/// lines are dropped; interior lines are kept verbatim.
fn parse_map(map: &str) -> Result<Vec<Vec<TileCode>>, LoadError> {
    let lines: Vec<&str> = map.lines().map(|l| l.trim_end_matches('\r')).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    let (Some(first), Some(last)) = (first, last) else {
        return Err(LoadError::EmptyMap);
    };

    let rows: Vec<Vec<TileCode>> = lines[first..=last].iter().map(|l| l.chars().collect()).collect();
    let expected = rows[0].len();
    if expected >= MAX_MAP_WIDTH {
        return Err(LoadError::TooWide(expected));
    }
    for (row, r) in rows.iter().enumerate() {
        if r.len() != expected {
            return Err(LoadError::RaggedRow { row, got: r.len(), expected });
        }
    }
    Ok(rows)
}

fn single_char(s: &str) -> Option<char> {
    let mut it = s.chars();
    match (it.next(), it.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
