/// Packed coordinate keys for sparse per-tile maps.
///
/// `key = y << 16 | x`. Lossless while the map is narrower than 65536
/// tiles, which the world loader enforces.

pub const MAX_MAP_WIDTH: usize = 1 << 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct CoordKey(pub u32);

impl CoordKey {
    #[inline]
    pub fn pack(x: usize, y: usize) -> Self {
        debug_assert!(x < MAX_MAP_WIDTH);
        CoordKey(((y as u32) << 16) | x as u32)
    }

    #[inline]
    pub fn x(self) -> usize {
        (self.0 & 0xFFFF) as usize
    }

    #[inline]
    pub fn y(self) -> usize {
        (self.0 >> 16) as usize
    }

    #[inline]
    pub fn unpack(self) -> (usize, usize) {
        (self.x(), self.y())
    }
}

/// Axis-aligned tile rectangle, inclusive of `x`/`y`, exclusive of `x + w`/`y + h`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.w && y < self.y + self.h
    }

    pub fn expand(&self, pad: i32) -> Self {
        Rect { x: self.x - pad, y: self.y - pad, w: self.w + pad * 2, h: self.h + pad * 2 }
    }

    pub fn area(&self) -> i64 {
        self.w.max(0) as i64 * self.h.max(0) as i64
    }

    pub fn perimeter(&self) -> i64 {
        2 * (self.w.max(0) as i64 + self.h.max(0) as i64)
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_is_lossless_at_corners() {
        for &(x, y) in &[(0, 0), (65535, 0), (0, 65535), (65535, 65535), (123, 4567)] {
            assert_eq!(CoordKey::pack(x, y).unpack(), (x, y));
        }
    }

    #[test]
    fn pack_is_injective_on_a_grid() {
        let mut seen = std::collections::HashSet::new();
        for y in 0..64 {
            for x in 0..300 {
                assert!(seen.insert(CoordKey::pack(x, y)));
            }
        }
    }

    #[test]
    fn rect_contains_and_expand() {
        let r = Rect::new(2, 3, 4, 5);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 7));
        assert!(!r.contains(6, 7));
        let e = r.expand(1);
        assert!(e.contains(1, 2));
        assert_eq!(e.area(), 6 * 7);
        assert_eq!(r.perimeter(), 18);
    }
}
