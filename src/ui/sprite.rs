/// Actor sprites.
///
/// A tiny built-in figure generator: three rows (head, body, legs) drawn in
/// the middle of an 8-column frame, colored from the actor's appearance
/// seed. Frames are cached per actor and keyed by `Actor::anim_key`, so an
/// actor whose animation state did not change since the last frame reuses
/// the previous grid instead of regenerating it.

use std::collections::HashMap;

use crate::domain::cell::Cell;
use crate::domain::entity::{Actor, ActorId, FOOTPRINT_WIDTH, SPRITE_HEIGHT};
use crate::domain::tile::Rgb;

pub const SPRITE_WIDTH: usize = FOOTPRINT_WIDTH as usize;
/// First column of the 3-wide figure inside the frame.
const FIGURE_COL: usize = 3;

const SKIN: [Rgb; 4] = [Rgb(241, 194, 125), Rgb(224, 172, 105), Rgb(198, 134, 66), Rgb(141, 85, 36)];
const HAIR: [Rgb; 4] = [Rgb(40, 30, 20), Rgb(120, 70, 30), Rgb(200, 160, 80), Rgb(90, 90, 95)];
const SHIRT: [Rgb; 6] = [
    Rgb(200, 60, 60), Rgb(60, 120, 200), Rgb(80, 170, 90),
    Rgb(220, 180, 60), Rgb(160, 90, 190), Rgb(230, 130, 50),
];
const PANTS: [Rgb; 3] = [Rgb(50, 60, 110), Rgb(70, 60, 50), Rgb(40, 40, 45)];

const FACE: [&str; 2] = ["(o)", "(-)"];
const BACK_OF_HEAD: &str = "(#)";
const ARMS: [&str; 4] = ["/█\\", "/█/", "/█‾", "/█/"];
const LEGS: [&str; 4] = ["/ \\", " | ", "/ \\", " |\\"];

/// Generated frame: `None` cells are transparent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sprite {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<Option<Cell>>,
}

impl Sprite {
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            None
        }
    }
}

struct Palette {
    skin: Rgb,
    hair: Rgb,
    shirt: Rgb,
    pants: Rgb,
}

fn palette(seed: u64) -> Palette {
    let h = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    Palette {
        skin: SKIN[(h >> 8) as usize % SKIN.len()],
        hair: HAIR[(h >> 16) as usize % HAIR.len()],
        shirt: SHIRT[(h >> 24) as usize % SHIRT.len()],
        pants: PANTS[(h >> 32) as usize % PANTS.len()],
    }
}

fn mirror(c: char) -> char {
    match c {
        '/' => '\\',
        '\\' => '/',
        '(' => ')',
        ')' => '(',
        other => other,
    }
}

/// Build the frame for `seed` in animation state `key` (see `Actor::anim_key`).
pub fn generate(seed: u64, key: u32) -> Sprite {
    let walk = (key & 3) as usize;
    let talk = ((key >> 2) & 3) as usize;
    let wave = ((key >> 4) & 3) as usize;
    let flip = key & (1 << 6) != 0;
    let backside = key & (1 << 7) != 0;
    let pal = palette(seed);

    let head = if backside { BACK_OF_HEAD } else { FACE[talk % FACE.len()] };
    let rows: [(&str, Rgb); 3] = [
        (head, if backside { pal.hair } else { pal.skin }),
        (ARMS[wave], pal.shirt),
        (LEGS[walk], pal.pants),
    ];

    let height = SPRITE_HEIGHT as usize;
    let mut cells = vec![None; SPRITE_WIDTH * height];
    for (y, (text, fg)) in rows.iter().enumerate().take(height) {
        let glyphs: Vec<char> = text.chars().collect();
        for (i, &ch) in glyphs.iter().enumerate() {
            if ch == ' ' {
                continue;
            }
            let (col, ch) = if flip {
                (FIGURE_COL + glyphs.len() - 1 - i, mirror(ch))
            } else {
                (FIGURE_COL + i, ch)
            };
            cells[y * SPRITE_WIDTH + col] = Some(Cell::new(ch, Some(*fg), None));
        }
    }
    Sprite { width: SPRITE_WIDTH, height, cells }
}

struct Slot {
    key: u32,
    sprite: Sprite,
}

/// One cached frame per actor.
#[derive(Default)]
pub struct SpriteCache {
    slots: HashMap<ActorId, Slot>,
    /// Frames generated so far (cache misses).
    pub generated: usize,
}

impl SpriteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&mut self, actor: &Actor) -> &Sprite {
        let key = actor.anim_key();
        let generated = &mut self.generated;
        let slot = self.slots.entry(actor.id).or_insert_with(|| {
            *generated += 1;
            Slot { key, sprite: generate(actor.seed, key) }
        });
        if slot.key != key {
            *generated += 1;
            slot.key = key;
            slot.sprite = generate(actor.seed, key);
        }
        &slot.sprite
    }

    /// Drop slots for actors that are gone.
    pub fn retain(&mut self, live: impl Fn(ActorId) -> bool) {
        self.slots.retain(|id, _| live(*id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::GestureKind;

    #[test]
    fn unchanged_state_reuses_frame() {
        let mut cache = SpriteCache::new();
        let mut a = Actor::new(1, "ada", 5, 0, 0);
        cache.frame(&a);
        cache.frame(&a);
        assert_eq!(cache.generated, 1);
        a.note_step(1, 0);
        cache.frame(&a);
        assert_eq!(cache.generated, 2);
        // Toggling a gesture without advancing it keeps the key.
        a.toggle_gesture(GestureKind::Talk);
        cache.frame(&a);
        assert_eq!(cache.generated, 2);
    }

    #[test]
    fn flip_mirrors_figure() {
        let right = generate(5, 0);
        let left = generate(5, 1 << 6);
        assert_eq!(right.get(3, 1).map(|c| c.ch), Some('/'));
        assert_eq!(left.get(5, 1).map(|c| c.ch), Some('\\'));
        assert_eq!(right.get(0, 0), None);
    }

    #[test]
    fn backside_hides_face() {
        let front = generate(9, 0);
        let back = generate(9, 1 << 7);
        assert_eq!(front.get(4, 0).map(|c| c.ch), Some('o'));
        assert_eq!(back.get(4, 0).map(|c| c.ch), Some('#'));
    }

    #[test]
    fn same_seed_same_colors() {
        assert_eq!(generate(77, 3), generate(77, 3));
    }

    #[test]
    fn retain_drops_departed_actors() {
        let mut cache = SpriteCache::new();
        let a = Actor::new(1, "ada", 5, 0, 0);
        let b = Actor::new(2, "basil", 6, 0, 0);
        cache.frame(&a);
        cache.frame(&b);
        cache.retain(|id| id == 2);
        cache.frame(&a);
        assert_eq!(cache.generated, 3);
    }
}
