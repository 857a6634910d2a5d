/// Camera: a viewport into the world.
///
/// `(x, y)` is the world coordinate of the top-left visible tile.
/// `(view_w, view_h)` is how many world tiles fit in the viewport; each
/// tile is `scale` terminal columns wide. The renderer sets the view size
/// from the terminal size every frame.

#[derive(Clone, Debug)]
pub struct Camera {
    /// World X of the top-left visible tile (negative when centering a small map)
    pub x: i32,
    /// World Y of the top-left visible tile
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
    pub scale: usize,
}

impl Camera {
    pub fn new(scale: usize) -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0, scale: scale.max(1) }
    }

    /// Fit the viewport to a screen area of `cols` x `rows` terminal cells.
    pub fn set_screen(&mut self, cols: usize, rows: usize) {
        self.view_w = cols / self.scale;
        self.view_h = rows;
    }

    /// Dead-zone follow: only scroll when the target nears the viewport edge.
    pub fn follow(&mut self, target_x: i32, target_y: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = follow_axis(self.x, target_x, self.view_w, world_w);
        self.y = follow_axis(self.y, target_y, self.view_h, world_h);
    }

    /// Snap directly to center on a position (no dead zone).
    pub fn center_on(&mut self, target_x: i32, target_y: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 {
            return;
        }
        self.x = center_axis(target_x, self.view_w, world_w);
        self.y = center_axis(target_y, self.view_h, world_h);
    }

    /// World coordinate to screen column/row relative to the map origin.
    pub fn world_to_screen(&self, wx: i32, wy: i32) -> (i32, i32) {
        ((wx - self.x) * self.scale as i32, wy - self.y)
    }
}

fn follow_axis(pos: i32, target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    // 20% margin on each side
    let margin = view as i32 / 5;
    let lo = pos + margin;
    let hi = pos + view as i32 - margin - 1;
    let mut p = pos;
    if target < lo {
        p = target - margin;
    } else if target > hi {
        p = target - view as i32 + margin + 1;
    }
    p.max(0).min((world as i32 - view as i32).max(0))
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    (target - view as i32 / 2).max(0).min((world as i32 - view as i32).max(0))
}
