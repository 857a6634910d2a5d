/// Actors: positioned, animated occupants of the world.
///
/// Position is the top-left of the sprite. Collision only cares about the
/// feet: a fixed-width footprint on the sprite's bottom row, regardless of
/// how wide the sprite draws.

use serde::Deserialize;

/// Tiles spanned by an actor's footprint.
pub const FOOTPRINT_WIDTH: i32 = 8;
/// First footprint column that must be walkable, relative to `x`.
pub const FOOT_INSET: i32 = 1;
/// Default sprite height in rows.
pub const SPRITE_HEIGHT: i32 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GestureKind {
    Talk,
    Wave,
}

pub type ActorId = u32;

#[derive(Clone, Debug)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    /// Appearance seed handed to the sprite generator.
    pub seed: u64,
    pub x: i32,
    pub y: i32,
    pub height: i32,
    pub facing: Facing,
    /// Moving away from the viewer; sprite selection only.
    pub backside: bool,
    pub talking: bool,
    pub waving: bool,
    pub walk_frame: u8,
    pub talk_frame: u8,
    pub wave_frame: u8,
}

impl Actor {
    pub fn new(id: ActorId, name: &str, seed: u64, x: i32, y: i32) -> Self {
        Actor {
            id,
            name: name.to_string(),
            seed,
            x,
            y,
            height: SPRITE_HEIGHT,
            facing: Facing::Right,
            backside: false,
            talking: false,
            waving: false,
            walk_frame: 0,
            talk_frame: 0,
            wave_frame: 0,
        }
    }

    /// Row the feet stand on.
    #[inline]
    pub fn foot_y(&self) -> i32 {
        self.y + self.height - 1
    }

    /// Walk-grid coordinate of this actor (sprite x, foot row).
    #[inline]
    pub fn grid_pos(&self) -> (i32, i32) {
        (self.x, self.foot_y())
    }

    /// Place the actor so its feet stand at walk-grid coordinate (x, fy).
    pub fn set_grid_pos(&mut self, x: i32, fy: i32) {
        self.x = x;
        self.y = fy - self.height + 1;
    }

    /// Center of the footprint, used for door proximity.
    #[inline]
    pub fn foot_center(&self) -> (i32, i32) {
        (self.x + FOOTPRINT_WIDTH / 2, self.foot_y())
    }

    pub fn toggle_gesture(&mut self, kind: GestureKind) {
        match kind {
            GestureKind::Talk => {
                self.talking = !self.talking;
                self.talk_frame = 0;
            }
            GestureKind::Wave => {
                self.waving = !self.waving;
                self.wave_frame = 0;
            }
        }
    }

    pub fn clear_gestures(&mut self) {
        self.talking = false;
        self.waving = false;
        self.talk_frame = 0;
        self.wave_frame = 0;
    }

    /// Advance gesture animation frames; called once per behavior tick.
    pub fn tick_gestures(&mut self) {
        if self.talking {
            self.talk_frame = (self.talk_frame + 1) % 4;
        }
        if self.waving {
            self.wave_frame = (self.wave_frame + 1) % 4;
        }
    }

    /// Record a one-tile step: flips facing on horizontal reversal and
    /// tracks backside while heading up-screen.
    pub fn note_step(&mut self, dx: i32, dy: i32) {
        if dx < 0 {
            self.facing = Facing::Left;
        } else if dx > 0 {
            self.facing = Facing::Right;
        }
        if dy < 0 {
            self.backside = true;
        } else if dy > 0 || dx != 0 {
            self.backside = false;
        }
        self.walk_frame = (self.walk_frame + 1) % 4;
    }

    /// Packed animation state used as the sprite cache key.
    ///
    /// bits 0-1 walk, 2-3 talk, 4-5 wave, 6 flip, 7 backside
    pub fn anim_key(&self) -> u32 {
        let talk = if self.talking { self.talk_frame } else { 0 };
        let wave = if self.waving { self.wave_frame } else { 0 };
        (self.walk_frame as u32 & 3)
            | (talk as u32 & 3) << 2
            | (wave as u32 & 3) << 4
            | (matches!(self.facing, Facing::Left) as u32) << 6
            | (self.backside as u32) << 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_pos_round_trips_through_feet() {
        let mut a = Actor::new(1, "ada", 7, 10, 4);
        assert_eq!(a.grid_pos(), (10, 6));
        a.set_grid_pos(3, 9);
        assert_eq!((a.x, a.y), (3, 7));
        assert_eq!(a.foot_center(), (7, 9));
    }

    #[test]
    fn facing_flips_only_on_reversal() {
        let mut a = Actor::new(1, "ada", 7, 0, 0);
        a.note_step(1, 0);
        assert_eq!(a.facing, Facing::Right);
        a.note_step(0, 1);
        assert_eq!(a.facing, Facing::Right);
        a.note_step(-1, 0);
        assert_eq!(a.facing, Facing::Left);
    }

    #[test]
    fn backside_tracks_upward_motion() {
        let mut a = Actor::new(1, "ada", 7, 0, 0);
        a.note_step(0, -1);
        assert!(a.backside);
        a.note_step(0, -1);
        assert!(a.backside);
        a.note_step(1, 0);
        assert!(!a.backside);
    }

    #[test]
    fn anim_key_changes_with_state() {
        let mut a = Actor::new(1, "ada", 7, 0, 0);
        let k0 = a.anim_key();
        a.toggle_gesture(GestureKind::Wave);
        assert_eq!(a.anim_key(), k0);
        a.tick_gestures();
        assert_ne!(a.anim_key(), k0);
        a.clear_gestures();
        assert_eq!(a.anim_key(), k0);
        a.note_step(-1, 0);
        assert_eq!(a.anim_key() & (1 << 6), 1 << 6);
    }
}
