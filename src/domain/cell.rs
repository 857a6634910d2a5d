/// Cell: one character cell of the screen, and the 2D buffer of them
/// that every frame is composed into before encoding.

use super::tile::Rgb;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Cell {
    pub ch: char,
    /// `None` = terminal default.
    pub fg: Option<Rgb>,
    pub bg: Option<Rgb>,
}

impl Cell {
    pub const BLANK: Cell = Cell { ch: ' ', fg: None, bg: None };

    pub const fn new(ch: char, fg: Option<Rgb>, bg: Option<Rgb>) -> Self {
        Cell { ch, fg, bg }
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::BLANK
    }
}

/// Row-major grid of cells. Cleared and repainted every frame.
pub struct CellBuffer {
    pub width: usize,
    pub height: usize,
    cells: Vec<Cell>,
}

impl CellBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        CellBuffer { width, height, cells: vec![Cell::BLANK; width * height] }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.cells = vec![Cell::BLANK; width * height];
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    /// Signed variant for sprite stamping; off-screen writes are dropped.
    #[inline]
    pub fn set_i(&mut self, x: i32, y: i32, cell: Cell) {
        if x >= 0 && y >= 0 {
            self.set(x as usize, y as usize, cell);
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }

    /// Write a string at (x, y). Each char occupies one column.
    pub fn put_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Rgb>, bg: Option<Rgb>) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width as i32 {
                break;
            }
            self.set_i(cx, y, Cell::new(ch, fg, bg));
            cx += 1;
        }
    }
}
