/// Presentation layer: compose a frame, then encode it as escape sequences.
///
/// How it works:
///   1. Clear the `CellBuffer` and paint HUD, tiles, actors, name labels
///   2. Encode the buffer into a reusable `Vec<u8>` with `queue!`
///   3. Hand the bytes to the output sink (see `ui::output`)
///
/// Encoding rules:
///   - Every row starts with an absolute `MoveTo`; line wrap is never relied on
///   - Colors are compared by value and only emitted when they change
///   - A row that leaves colors set ends with a reset
///   - The byte buffer is grown when undersized, never shrunk

use std::io::{self, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::behavior::BehaviorState;
use crate::domain::cell::{Cell, CellBuffer};
use crate::domain::tile::Rgb;
use crate::sim::world::WorldState;
use super::sprite::SpriteCache;

/// Rows reserved above the map.
pub const HUD_ROWS: usize = 1;
/// Upper bound on bytes per cell: MoveTo amortized, two 24-bit color
/// sequences, and a 4-byte glyph.
const BYTES_PER_CELL: usize = 30;
const ROW_OVERHEAD: usize = 16;

const HUD_FG: Rgb = Rgb(230, 230, 210);
const HUD_BG: Rgb = Rgb(30, 34, 48);
const LABEL_FG: Rgb = Rgb(235, 235, 235);
const LABEL_OBSERVED: Rgb = Rgb(255, 220, 90);

pub struct Renderer {
    buf: CellBuffer,
    sprites: SpriteCache,
    /// Whether keyboard enhancement was pushed and must be popped.
    enhanced: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer { buf: CellBuffer::new(0, 0), sprites: SpriteCache::new(), enhanced: false }
    }

    /// Raw mode, alternate screen, hidden cursor. Returns whether the
    /// terminal accepted keyboard enhancement (key release reporting).
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, terminal::EnterAlternateScreen, cursor::Hide, Clear(ClearType::All))?;
        if matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            execute!(
                out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced = true;
        }
        Ok(self.enhanced)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        let mut out = io::stdout();
        if self.enhanced {
            execute!(out, PopKeyboardEnhancementFlags)?;
            self.enhanced = false;
        }
        execute!(out, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    /// Compose the current world into the cell buffer for a `cols` x `rows`
    /// terminal and encode it into `out`.
    pub fn render(&mut self, world: &mut WorldState, cols: usize, rows: usize, out: &mut Vec<u8>) -> io::Result<()> {
        self.compose(world, cols, rows);
        encode_frame(&self.buf, out)
    }

    pub fn buffer(&self) -> &CellBuffer {
        &self.buf
    }

    // ── Compose ──

    pub fn compose(&mut self, world: &mut WorldState, cols: usize, rows: usize) {
        self.buf.resize(cols, rows);
        self.buf.clear();

        let map_rows = rows.saturating_sub(HUD_ROWS);
        let before = (world.camera.view_w, world.camera.view_h);
        world.camera.set_screen(cols, map_rows);
        if before != (world.camera.view_w, world.camera.view_h) {
            if let Some(a) = world.observed.and_then(|id| world.agent(id)) {
                let (cx, cy) = a.actor.foot_center();
                let (w, h) = (world.tiles.width, world.tiles.height);
                world.camera.center_on(cx, cy, w, h);
            }
        }

        world.tiles.render(
            &mut self.buf,
            &world.camera,
            HUD_ROWS,
            world.tick,
            world.wind,
            world.cfg.render.walk_mark_ticks,
        );
        self.compose_actors(world, map_rows);
        self.compose_hud(world);
    }

    fn compose_actors(&mut self, world: &WorldState, map_rows: usize) {
        let cam = &world.camera;
        let scale = cam.scale as i32;
        let top = HUD_ROWS as i32;
        let bottom = top + map_rows as i32;

        // Painter's order: farther up-screen first.
        let mut order: Vec<usize> = (0..world.agents.len()).collect();
        order.sort_by_key(|&i| (world.agents[i].actor.foot_y(), world.agents[i].actor.id));

        self.sprites.retain(|id| world.agents.iter().any(|a| a.actor.id == id));

        for &i in &order {
            let actor = &world.agents[i].actor;
            let sprite = self.sprites.frame(actor);
            for sy in 0..sprite.height {
                for sx in 0..sprite.width {
                    let Some(cell) = sprite.get(sx, sy) else { continue };
                    let (col, row) = cam.world_to_screen(actor.x + sx as i32, actor.y + sy as i32);
                    let row = row + top;
                    if row < top || row >= bottom {
                        continue;
                    }
                    // One sprite cell covers `scale` columns, each over its own background.
                    for k in 0..scale {
                        let c = col + k;
                        let under = if c >= 0 { self.buf.get(c as usize, row as usize) } else { Cell::BLANK };
                        self.buf.set_i(c, row, Cell::new(cell.ch, cell.fg, under.bg));
                    }
                }
            }
        }

        for &i in &order {
            let actor = &world.agents[i].actor;
            let (col, row) = cam.world_to_screen(actor.x, actor.y - 1);
            let row = row + top;
            if row < top || row >= bottom {
                continue;
            }
            let fg = if world.observed == Some(actor.id) { LABEL_OBSERVED } else { LABEL_FG };
            let width = crate::ui::sprite::SPRITE_WIDTH as i32 * scale;
            let len = actor.name.chars().count() as i32;
            let start = col + (width - len) / 2;
            for (k, ch) in actor.name.chars().enumerate() {
                let c = start + k as i32;
                if c < 0 {
                    continue;
                }
                let under = self.buf.get(c as usize, row as usize);
                self.buf.set_i(c, row, Cell::new(ch, Some(fg), under.bg));
            }
        }
    }

    fn compose_hud(&mut self, world: &WorldState) {
        for x in 0..self.buf.width {
            self.buf.set(x, 0, Cell::new(' ', None, Some(HUD_BG)));
        }
        let watching = world
            .observed
            .and_then(|id| world.agent(id))
            .map(|a| {
                let state = match a.behavior.state {
                    BehaviorState::Idle { .. } => "idle",
                    BehaviorState::Walking => "walking",
                    BehaviorState::Waiting { .. } => "waiting",
                };
                format!("{} ({state})", a.actor.name)
            })
            .unwrap_or_else(|| "nobody".to_string());
        let open = (0..world.doors.doors.len()).filter(|&i| world.doors.is_open(i)).count();
        let text = format!(
            " {}  tick {}  actors {}  doors open {}/{}  watching {}   arrows move  t talk  w wave  space stop  j join  l leave  tab next  q quit",
            world.name,
            world.tick,
            world.agents.len(),
            open,
            world.doors.doors.len(),
            watching,
        );
        self.buf.put_str(0, 0, &text, Some(HUD_FG), Some(HUD_BG));
    }
}

// ── Encode ──

fn to_color(c: Option<Rgb>) -> Color {
    match c {
        Some(Rgb(r, g, b)) => Color::Rgb { r, g, b },
        None => Color::Reset,
    }
}

/// Serialize `buf` into `out` (cleared first).
pub fn encode_frame(buf: &CellBuffer, out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    let need = buf.width * buf.height * BYTES_PER_CELL + buf.height * ROW_OVERHEAD;
    if out.capacity() < need {
        out.reserve(need);
    }

    let mut fg: Option<Rgb> = None;
    let mut bg: Option<Rgb> = None;
    for y in 0..buf.height {
        queue!(out, MoveTo(0, y as u16))?;
        for cell in buf.row(y) {
            if cell.fg != fg {
                queue!(out, SetForegroundColor(to_color(cell.fg)))?;
                fg = cell.fg;
            }
            if cell.bg != bg {
                queue!(out, SetBackgroundColor(to_color(cell.bg)))?;
                bg = cell.bg;
            }
            queue!(out, Print(cell.ch))?;
        }
        if fg.is_some() || bg.is_some() {
            queue!(out, ResetColor)?;
            fg = None;
            bg = None;
        }
    }
    if fg.is_some() || bg.is_some() {
        queue!(out, ResetColor)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::sim::level::load_world;

    fn striped(shared: bool) -> CellBuffer {
        let red_a = Rgb(200, 10, 10);
        let red_b = Rgb::new(200, 10, 10);
        let mut buf = CellBuffer::new(6, 2);
        for y in 0..2 {
            for x in 0..6 {
                let fg = if shared || x % 2 == 0 { red_a } else { red_b };
                buf.set(x, y, Cell::new('x', Some(fg), None));
            }
        }
        buf
    }

    #[test]
    fn equal_colors_encode_identically() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encode_frame(&striped(true), &mut a).unwrap();
        encode_frame(&striped(false), &mut b).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn color_emitted_once_per_run() {
        let mut out = Vec::new();
        encode_frame(&striped(true), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("38;2;200;10;10").count(), 2);
        assert_eq!(text.matches("\x1b[0m").count(), 2);
    }

    #[test]
    fn rows_start_with_absolute_position() {
        let mut out = Vec::new();
        encode_frame(&CellBuffer::new(3, 3), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\x1b[1;1H"));
        assert!(text.contains("\x1b[2;1H"));
        assert!(text.contains("\x1b[3;1H"));
        // Uncolored frame never touches color state.
        assert!(!text.contains("\x1b[0m"));
    }

    #[test]
    fn buffer_grows_but_never_shrinks() {
        let mut out = Vec::new();
        encode_frame(&CellBuffer::new(20, 10), &mut out).unwrap();
        let big = out.capacity();
        assert!(big >= 20 * 10 * BYTES_PER_CELL);
        encode_frame(&CellBuffer::new(2, 1), &mut out).unwrap();
        assert_eq!(out.capacity(), big);
    }

    #[test]
    fn rerender_is_byte_stable() {
        let mut w = WorldState::new(load_world(None).unwrap(), AppConfig::default(), 2);
        w.populate(3);
        let mut r = Renderer::new();
        let mut first = Vec::new();
        let mut second = Vec::new();
        r.render(&mut w, 80, 24, &mut first).unwrap();
        r.render(&mut w, 80, 24, &mut second).unwrap();
        assert_eq!(first, second);
        assert!(r.sprites.generated <= 3);
    }

    #[test]
    fn hud_and_labels_are_drawn() {
        let mut w = WorldState::new(load_world(None).unwrap(), AppConfig::default(), 2);
        let id = w.join("Zed", 1);
        let mut r = Renderer::new();
        r.compose(&mut w, 120, 40);
        let hud: String = r.buffer().row(0).iter().map(|c| c.ch).collect();
        assert!(hud.contains("watching Zed (idle)"));

        let actor = &w.agent(id).unwrap().actor;
        let (col, row) = w.camera.world_to_screen(actor.x, actor.y - 1);
        let label_row: String = r.buffer().row((row + HUD_ROWS as i32) as usize).iter().map(|c| c.ch).collect();
        assert!(col >= 0);
        assert!(label_row.contains("Zed"));
    }

    #[test]
    fn double_width_sprites_fill_both_columns() {
        let mut cfg = AppConfig::default();
        cfg.render.scale = 2;
        let mut w = WorldState::new(load_world(None).unwrap(), cfg, 2);
        let id = w.join("Zed", 1);
        let mut r = Renderer::new();
        r.compose(&mut w, 120, 40);

        let actor = w.agent(id).unwrap().actor.clone();
        let sprite = r.sprites.frame(&actor).clone();
        let mut stamped = 0;
        for sy in 0..sprite.height {
            for sx in 0..sprite.width {
                let Some(cell) = sprite.get(sx, sy) else { continue };
                let (col, row) = w.camera.world_to_screen(actor.x + sx as i32, actor.y + sy as i32);
                let row = (row + HUD_ROWS as i32) as usize;
                assert_eq!(r.buffer().get(col as usize, row).ch, cell.ch);
                assert_eq!(r.buffer().get(col as usize + 1, row).ch, cell.ch);
                stamped += 1;
            }
        }
        assert!(stamped > 0);
    }

    #[test]
    fn labels_keep_tile_background() {
        let mut cfg = AppConfig::default();
        cfg.render.scale = 2;
        let mut w = WorldState::new(load_world(None).unwrap(), cfg, 2);
        let id = w.join("Zed", 1);
        let mut r = Renderer::new();
        r.compose(&mut w, 120, 40);

        let actor = w.agent(id).unwrap().actor.clone();
        let (col, row) = w.camera.world_to_screen(actor.x, actor.y - 1);
        let row = (row + HUD_ROWS as i32) as usize;
        let cells = r.buffer().row(row);
        let start = cells
            .windows(3)
            .position(|win| win.iter().map(|c| c.ch).eq("Zed".chars()))
            .unwrap();
        assert!(start as i32 >= col);
        for c in start..start + 3 {
            let wx = w.camera.x + (c / w.camera.scale) as i32;
            let tile = w.tiles.tile_cell(wx, actor.y - 1, w.tick, w.wind, w.cfg.render.walk_mark_ticks);
            assert_eq!(cells[c].bg, tile.bg);
        }
    }
}
