/// Overlay layer: sparse per-tile overrides stacked on the immutable grid.
///
/// Placed furniture and door panels live here instead of in the tile grid.
/// A key present in `walkable` always wins over the base tile; a key in
/// `visual` replaces the tile's glyph and colors when rendering.

use std::collections::HashMap;

use super::cell::Cell;
use super::coord::CoordKey;
use super::tile::Rgb;

/// Furniture / built-object definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectDef {
    pub glyph: char,
    pub fg: Option<Rgb>,
    pub bg: Option<Rgb>,
    pub walkable: bool,
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub kind: String,
    pub x: usize,
    pub y: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Overlay {
    pub visual: HashMap<CoordKey, Cell>,
    pub walkable: HashMap<CoordKey, bool>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp every placement. Placements whose kind has no definition are
    /// skipped; the loader rejects those before we get here.
    pub fn build(placements: &[Placement], defs: &HashMap<String, ObjectDef>) -> Self {
        let mut overlay = Overlay::new();
        for p in placements {
            if let Some(def) = defs.get(&p.kind) {
                overlay.stamp_object(p.x, p.y, def);
            }
        }
        overlay
    }

    /// Drop everything and restamp from placements. Door panels must be
    /// re-applied by the caller afterwards.
    pub fn rebuild(&mut self, placements: &[Placement], defs: &HashMap<String, ObjectDef>) {
        *self = Overlay::build(placements, defs);
    }

    fn stamp_object(&mut self, x: usize, y: usize, def: &ObjectDef) {
        let cell = Cell::new(def.glyph, def.fg, def.bg);
        for dy in 0..def.height {
            for dx in 0..def.width {
                let key = CoordKey::pack(x + dx, y + dy);
                self.visual.insert(key, cell);
                self.walkable.insert(key, def.walkable);
            }
        }
    }

    #[inline]
    pub fn walkable_at(&self, key: CoordKey) -> Option<bool> {
        self.walkable.get(&key).copied()
    }

    #[inline]
    pub fn visual_at(&self, key: CoordKey) -> Option<&Cell> {
        self.visual.get(&key)
    }

    pub fn set(&mut self, key: CoordKey, cell: Cell, walkable: bool) {
        self.visual.insert(key, cell);
        self.walkable.insert(key, walkable);
    }

    pub fn remove(&mut self, key: CoordKey) {
        self.visual.remove(&key);
        self.walkable.remove(&key);
    }
}
