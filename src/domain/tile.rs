/// Tile codes and their definitions.
/// A tile code is the single character used in the world map; all display
/// and walkability semantics are resolved through the `TileTable`, so the
/// grid itself stays a plain array of codes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type TileCode = char;

/// 24-bit color. Deserializes from `[r, g, b]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb(r, g, b)
    }

    /// Shift the green channel, saturating at both ends.
    pub fn shift_green(self, delta: i16) -> Self {
        let g = (self.1 as i16 + delta).clamp(0, 255) as u8;
        Rgb(self.0, g, self.2)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TileDef {
    pub glyph: char,
    pub fg: Option<Rgb>,
    pub bg: Option<Rgb>,
    pub walkable: bool,
    /// Counts as wall material for building detection.
    pub wall: bool,
    /// Door tiles bound flood-fill regions and are always walkable in the walk grid.
    pub door: bool,
}

impl TileDef {
    pub fn floor(glyph: char) -> Self {
        TileDef { glyph, fg: None, bg: None, walkable: true, wall: false, door: false }
    }

    pub fn wall(glyph: char) -> Self {
        TileDef { glyph, fg: None, bg: None, walkable: false, wall: true, door: false }
    }
}

/// Decorative ground variants for a tile code (grass, gravel, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroundVariation {
    pub variants: Vec<char>,
    /// Shown while the tile was recently walked on.
    pub flattened: char,
}

#[derive(Clone, Debug, Default)]
pub struct TileTable {
    defs: HashMap<TileCode, TileDef>,
    ground: HashMap<TileCode, GroundVariation>,
}

impl TileTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: TileCode, def: TileDef) {
        self.defs.insert(code, def);
    }

    pub fn set_ground(&mut self, code: TileCode, variation: GroundVariation) {
        self.ground.insert(code, variation);
    }

    #[inline]
    pub fn get(&self, code: TileCode) -> Option<&TileDef> {
        self.defs.get(&code)
    }

    #[inline]
    pub fn ground(&self, code: TileCode) -> Option<&GroundVariation> {
        self.ground.get(&code)
    }

    pub fn contains(&self, code: TileCode) -> bool {
        self.defs.contains_key(&code)
    }

    pub fn is_walkable(&self, code: TileCode) -> bool {
        self.defs.get(&code).map_or(false, |d| d.walkable)
    }

    pub fn is_wall(&self, code: TileCode) -> bool {
        self.defs.get(&code).map_or(false, |d| d.wall)
    }

    pub fn is_door(&self, code: TileCode) -> bool {
        self.defs.get(&code).map_or(false, |d| d.door)
    }
}
