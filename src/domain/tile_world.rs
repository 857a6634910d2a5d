/// TileWorld: the static tile grid plus the overlay stacked on it.
///
/// ## Layers
///   - `tiles`   — the world as loaded. Never mutated after load.
///   - `overlay` — furniture and door panels; wins over the base tile.
///   - `walked`  — tick at which a tile was last stepped on (cosmetic only).
///
/// `is_walkable` is the single source of truth for live walkability.
/// `is_base_walkable` ignores the overlay and is what room detection uses.

use std::collections::{HashMap, HashSet};

use super::camera::Camera;
use super::cell::{Cell, CellBuffer};
use super::coord::CoordKey;
use super::overlay::Overlay;
use super::tile::{TileCode, TileDef, TileTable};

/// Peak green-channel swing under full wind.
const WIND_GREEN_SWING: f32 = 28.0;

pub struct TileWorld {
    pub width: usize,
    pub height: usize,
    tiles: Vec<TileCode>,
    pub table: TileTable,
    pub overlay: Overlay,
    /// Coordinates covered by door spans (static geometry).
    door_cells: HashSet<CoordKey>,
    walked: HashMap<CoordKey, u64>,
}

impl TileWorld {
    /// `rows` must be rectangular and every code known to `table`; the
    /// world loader validates both.
    pub fn new(rows: &[Vec<TileCode>], table: TileTable) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut tiles = Vec::with_capacity(width * height);
        for row in rows {
            tiles.extend_from_slice(row);
        }
        TileWorld {
            width,
            height,
            tiles,
            table,
            overlay: Overlay::new(),
            door_cells: HashSet::new(),
            walked: HashMap::new(),
        }
    }

    /// Build from string rows; handy for fixtures.
    pub fn from_strs(rows: &[&str], table: TileTable) -> Self {
        let rows: Vec<Vec<TileCode>> = rows.iter().map(|r| r.chars().collect()).collect();
        Self::new(&rows, table)
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline]
    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileCode> {
        if self.in_bounds(x, y) {
            Some(self.tiles[y as usize * self.width + x as usize])
        } else {
            None
        }
    }

    #[inline]
    pub fn def_at(&self, x: i32, y: i32) -> Option<&TileDef> {
        self.tile_at(x, y).and_then(|c| self.table.get(c))
    }

    /// Live walkability: false out of bounds, overlay if present, else tile.
    #[inline]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        if let Some(w) = self.overlay.walkable_at(CoordKey::pack(x as usize, y as usize)) {
            return w;
        }
        self.def_at(x, y).map_or(false, |d| d.walkable)
    }

    /// Tile-definition walkability, ignoring the overlay.
    #[inline]
    pub fn is_base_walkable(&self, x: i32, y: i32) -> bool {
        self.def_at(x, y).map_or(false, |d| d.walkable)
    }

    #[inline]
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.def_at(x, y).map_or(false, |d| d.wall)
    }

    #[inline]
    pub fn is_door(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        self.door_cells.contains(&CoordKey::pack(x as usize, y as usize))
            || self.def_at(x, y).map_or(false, |d| d.door)
    }

    pub fn mark_door_cell(&mut self, x: usize, y: usize) {
        self.door_cells.insert(CoordKey::pack(x, y));
    }

    /// Remember that an actor stood on (x, y) at `tick`.
    pub fn mark_walked(&mut self, x: i32, y: i32, tick: u64) {
        if !self.in_bounds(x, y) {
            return;
        }
        let key = CoordKey::pack(x as usize, y as usize);
        if self.table.ground(self.tiles[y as usize * self.width + x as usize]).is_some() {
            self.walked.insert(key, tick);
        }
    }

    pub fn prune_walked(&mut self, tick: u64, ttl: u64) {
        self.walked.retain(|_, t| tick.saturating_sub(*t) < ttl);
    }

    // ── Rendering ──

    /// Paint every visible tile into `buf`, starting at buffer row `top`.
    pub fn render(
        &self,
        buf: &mut CellBuffer,
        cam: &Camera,
        top: usize,
        tick: u64,
        wind: f32,
        walk_ttl: u64,
    ) {
        for vy in 0..cam.view_h {
            let row = top + vy;
            if row >= buf.height {
                break;
            }
            let wy = cam.y + vy as i32;
            for col in 0..cam.view_w * cam.scale {
                if col >= buf.width {
                    break;
                }
                let wx = cam.x + (col / cam.scale) as i32;
                let cell = self.tile_cell(wx, wy, tick, wind, walk_ttl);
                buf.set(col, row, cell);
            }
        }
    }

    /// Visual of one world tile at `tick`. Void outside the map.
    pub fn tile_cell(&self, x: i32, y: i32, tick: u64, wind: f32, walk_ttl: u64) -> Cell {
        let Some(code) = self.tile_at(x, y) else {
            return Cell::BLANK;
        };
        let key = CoordKey::pack(x as usize, y as usize);
        if let Some(cell) = self.overlay.visual_at(key) {
            return *cell;
        }
        let Some(def) = self.table.get(code) else {
            return Cell::BLANK;
        };
        let mut cell = Cell::new(def.glyph, def.fg, def.bg);

        let Some(ground) = self.table.ground(code) else {
            return cell;
        };
        if ground.variants.is_empty() {
            return cell;
        }

        if let Some(&t) = self.walked.get(&key) {
            if tick.saturating_sub(t) < walk_ttl {
                cell.ch = ground.flattened;
                return cell;
            }
        }

        let n = ground.variants.len();
        let mut idx = (tile_hash(x, y) as usize) % n;
        if wind > 0.0 {
            let sway = wind_wave(x, y, tick);
            if sway * wind > 0.5 {
                idx = (idx + 1) % n;
            }
            if let Some(fg) = cell.fg {
                let delta = ((sway - 0.5) * 2.0 * wind * WIND_GREEN_SWING) as i16;
                cell.fg = Some(fg.shift_green(delta));
            }
        }
        cell.ch = ground.variants[idx];
        cell
    }
}

/// Deterministic per-tile hash; the same tile always picks the same variant.
#[inline]
fn tile_hash(x: i32, y: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(374_761_393) ^ (y as u32).wrapping_mul(668_265_263);
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    h ^ (h >> 16)
}

/// Triangle wave in [0, 1] travelling diagonally across the map.
#[inline]
fn wind_wave(x: i32, y: i32, tick: u64) -> f32 {
    let phase = ((x * 3 + y * 5) as i64 + (tick / 3) as i64).rem_euclid(32) as i32;
    (phase - 16).abs() as f32 / 16.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tile::{GroundVariation, Rgb};

    fn table() -> TileTable {
        let mut t = TileTable::new();
        t.insert('#', TileDef::wall('#'));
        t.insert('.', TileDef::floor('.'));
        let mut grass = TileDef::floor(',');
        grass.fg = Some(Rgb(40, 160, 40));
        t.insert(',', grass);
        t.set_ground(',', GroundVariation { variants: vec![',', '\'', '"'], flattened: '_' });
        t
    }

    #[test]
    fn out_of_bounds_is_not_walkable() {
        let w = TileWorld::from_strs(&["..", ".."], table());
        assert!(!w.is_walkable(-1, 0));
        assert!(!w.is_walkable(2, 0));
        assert!(!w.is_walkable(0, 2));
    }

    #[test]
    fn overlay_wins_over_tile_both_ways() {
        let mut w = TileWorld::from_strs(&["#.", ".#"], table());
        for y in 0..2 {
            for x in 0..2 {
                let base = w.is_base_walkable(x, y);
                w.overlay.set(CoordKey::pack(x as usize, y as usize), Cell::BLANK, !base);
                assert_eq!(w.is_walkable(x, y), !base);
                assert_eq!(w.is_base_walkable(x, y), base);
            }
        }
    }

    #[test]
    fn ground_variant_is_stable_without_wind() {
        let w = TileWorld::from_strs(&[",,,,", ",,,,"], table());
        for x in 0..4 {
            let a = w.tile_cell(x, 1, 0, 0.0, 10);
            let b = w.tile_cell(x, 1, 999, 0.0, 10);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn walked_tile_shows_flattened_until_expiry() {
        let mut w = TileWorld::from_strs(&[",,"], table());
        w.mark_walked(1, 0, 100);
        assert_eq!(w.tile_cell(1, 0, 105, 0.0, 10).ch, '_');
        assert_ne!(w.tile_cell(1, 0, 111, 0.0, 10).ch, '_');
        w.prune_walked(200, 10);
        assert!(w.walked.is_empty());
    }

    #[test]
    fn walking_on_plain_floor_leaves_no_mark() {
        let mut w = TileWorld::from_strs(&[".."], table());
        w.mark_walked(0, 0, 1);
        assert!(w.walked.is_empty());
    }

    #[test]
    fn wind_only_touches_variant_tiles() {
        let w = TileWorld::from_strs(&["#,"], table());
        assert_eq!(w.tile_cell(0, 0, 7, 1.0, 10).ch, '#');
        let grass = w.tile_cell(1, 0, 7, 1.0, 10);
        assert!([',', '\'', '"'].contains(&grass.ch));
    }

    #[test]
    fn render_fills_view_and_voids_outside() {
        let w = TileWorld::from_strs(&["#.", ".#"], table());
        let mut cam = Camera::new(2);
        cam.set_screen(8, 3);
        cam.x = -1;
        let mut buf = CellBuffer::new(8, 4);
        w.render(&mut buf, &cam, 1, 0, 0.0, 10);
        assert_eq!(buf.get(0, 1), Cell::BLANK);
        assert_eq!(buf.get(2, 1).ch, '#');
        assert_eq!(buf.get(3, 1).ch, '#');
        assert_eq!(buf.get(4, 1).ch, '.');
        assert_eq!(buf.get(2, 2).ch, '.');
        assert_eq!(buf.get(2, 3), Cell::BLANK);
    }
}
