/// Walk grid: precomputed "can an actor stand here" bits.
///
/// Cell (x, y) is true iff footprint tiles `x+1 ..= x+7` on row `y` are all
/// walkable. Door tiles always count as walkable here, whatever their
/// current animation state, so routes are planned through closed doors and
/// the live occupancy check makes actors wait for them at run time.
///
/// Rebuilt only on structural change (placements, door geometry).

use super::entity::{FOOTPRINT_WIDTH, FOOT_INSET};
use super::tile_world::TileWorld;

#[derive(Clone, Debug)]
pub struct WalkGrid {
    pub width: usize,
    pub height: usize,
    cells: Vec<bool>,
}

impl WalkGrid {
    pub fn build(world: &TileWorld) -> Self {
        let (w, h) = (world.width, world.height);
        let mut cells = vec![false; w * h];
        for y in 0..h as i32 {
            for x in 0..w as i32 {
                cells[y as usize * w + x as usize] =
                    footprint_clear(x, y, |tx, ty| world.is_door(tx, ty) || world.is_walkable(tx, ty));
            }
        }
        WalkGrid { width: w, height: h, cells }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.cells[y as usize * self.width + x as usize]
    }

    #[inline]
    pub fn index(&self, x: i32, y: i32) -> usize {
        y as usize * self.width + x as usize
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// Footprint test against an arbitrary per-tile predicate.
#[inline]
pub fn footprint_clear(x: i32, y: i32, walkable: impl Fn(i32, i32) -> bool) -> bool {
    (x + FOOT_INSET..x + FOOTPRINT_WIDTH).all(|tx| walkable(tx, y))
}

/// Live occupancy: like the walk grid but honoring current door state.
#[inline]
pub fn can_stand(world: &TileWorld, x: i32, y: i32) -> bool {
    footprint_clear(x, y, |tx, ty| world.is_walkable(tx, ty))
}
