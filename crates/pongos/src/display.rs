//! Double-buffered VGA text display
//!
//! The VGA text buffer is an 80x25 grid of 16-bit cells at physical
//! address `0xB8000`: the low byte is the glyph (code page 437), the high
//! byte the color attribute (bits 0-3 foreground, bits 4-7 background).
//!
//! [`Screen`] keeps an off-screen copy of that grid in an arena block.
//! Every drawing call lands there; the device only changes when
//! [`Screen::present`] copies the whole frame across, so a half-drawn frame
//! is never visible.
//!
//! # Example
//!
//! ```
//! use pongos::arena::Arena;
//! use pongos::display::{Attribute, Color, MemorySurface, Screen};
//!
//! let arena = Arena::new(vec![0u8; 8192]).unwrap();
//! let mut screen = Screen::new(arena, MemorySurface::new()).unwrap();
//!
//! let red = Attribute::new(Color::White, Color::Red);
//! screen.set_cell(3, 4, b'X', red);
//! assert_eq!(screen.front_cell(3, 4).glyph(), b' ');
//!
//! screen.present();
//! assert_eq!(screen.front_cell(3, 4).glyph(), b'X');
//! ```

use core::fmt;

use crate::arena::{Arena, Block};
use crate::error::ArenaError;

/// Grid width in cells
pub const WIDTH: usize = 80;
/// Grid height in cells
pub const HEIGHT: usize = 25;
/// Cells per grid
pub const CELL_COUNT: usize = WIDTH * HEIGHT;
/// Bytes per grid
pub const GRID_BYTES: usize = CELL_COUNT * 2;

/// Physical address of the color text buffer
pub const TEXT_MODE_ADDRESS: usize = 0xB8000;

/// The 16-color text mode palette
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGrey = 7,
    DarkGrey = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    LightMagenta = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    /// Palette entry for the low nibble of `value`
    pub const fn from_nibble(value: u8) -> Color {
        match value & 0x0F {
            0 => Color::Black,
            1 => Color::Blue,
            2 => Color::Green,
            3 => Color::Cyan,
            4 => Color::Red,
            5 => Color::Magenta,
            6 => Color::Brown,
            7 => Color::LightGrey,
            8 => Color::DarkGrey,
            9 => Color::LightBlue,
            10 => Color::LightGreen,
            11 => Color::LightCyan,
            12 => Color::LightRed,
            13 => Color::LightMagenta,
            14 => Color::Yellow,
            _ => Color::White,
        }
    }
}

/// Foreground/background color pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Attribute(pub u8);

impl Attribute {
    /// Light grey on black, the text mode default
    pub const DEFAULT: Attribute = Attribute::new(Color::LightGrey, Color::Black);

    #[inline]
    pub const fn new(foreground: Color, background: Color) -> Self {
        Attribute((foreground as u8) | ((background as u8) << 4))
    }

    #[inline]
    pub const fn foreground(self) -> Color {
        Color::from_nibble(self.0)
    }

    #[inline]
    pub const fn background(self) -> Color {
        Color::from_nibble(self.0 >> 4)
    }
}

/// One display cell: glyph in the low byte, attribute in the high byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Cell(pub u16);

impl Cell {
    #[inline]
    pub const fn new(glyph: u8, attribute: Attribute) -> Self {
        Cell((glyph as u16) | ((attribute.0 as u16) << 8))
    }

    /// A space in the given colors
    #[inline]
    pub const fn blank(attribute: Attribute) -> Self {
        Cell::new(b' ', attribute)
    }

    #[inline]
    pub const fn glyph(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn attribute(self) -> Attribute {
        Attribute((self.0 >> 8) as u8)
    }
}

/// A cell grid that can be shown to the user
///
/// `index` is `y * WIDTH + x` and always below [`CELL_COUNT`].
pub trait Surface {
    fn write_cell(&mut self, index: usize, cell: Cell);
    fn read_cell(&self, index: usize) -> Cell;
}

/// Memory-mapped VGA text buffer
#[derive(Debug)]
pub struct VgaBuffer {
    base: *mut u16,
}

impl VgaBuffer {
    /// # Safety
    ///
    /// `address` must be identity mapped and point at `CELL_COUNT`
    /// writable cells that nothing else accesses.
    pub const unsafe fn new(address: usize) -> Self {
        VgaBuffer { base: address as *mut u16 }
    }

    /// The color text buffer at `0xB8000`
    ///
    /// # Safety
    ///
    /// Same contract as [`VgaBuffer::new`].
    pub const unsafe fn text_mode() -> Self {
        // SAFETY: forwarded to the caller
        unsafe { VgaBuffer::new(TEXT_MODE_ADDRESS) }
    }
}

impl Surface for VgaBuffer {
    #[inline]
    fn write_cell(&mut self, index: usize, cell: Cell) {
        debug_assert!(index < CELL_COUNT);
        if index < CELL_COUNT {
            // SAFETY: in bounds of the region promised to `new`
            unsafe { self.base.add(index).write_volatile(cell.0) }
        }
    }

    #[inline]
    fn read_cell(&self, index: usize) -> Cell {
        debug_assert!(index < CELL_COUNT);
        if index < CELL_COUNT {
            // SAFETY: see `write_cell`
            Cell(unsafe { self.base.add(index).read_volatile() })
        } else {
            Cell::default()
        }
    }
}

/// In-memory surface, for hosts and tests
#[derive(Clone)]
pub struct MemorySurface {
    cells: [Cell; CELL_COUNT],
    writes: usize,
}

impl MemorySurface {
    pub const fn new() -> Self {
        MemorySurface {
            cells: [Cell(0); CELL_COUNT],
            writes: 0,
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, x: usize, y: usize) -> Cell {
        self.cells[y * WIDTH + x]
    }

    /// One row as a slice of cells
    pub fn row(&self, y: usize) -> &[Cell] {
        &self.cells[y * WIDTH..(y + 1) * WIDTH]
    }

    /// Total cell writes received
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for MemorySurface {
    fn write_cell(&mut self, index: usize, cell: Cell) {
        self.cells[index] = cell;
        self.writes += 1;
    }

    fn read_cell(&self, index: usize) -> Cell {
        self.cells[index]
    }
}

impl<T: Surface + ?Sized> Surface for &mut T {
    fn write_cell(&mut self, index: usize, cell: Cell) {
        (**self).write_cell(index, cell);
    }

    fn read_cell(&self, index: usize) -> Cell {
        (**self).read_cell(index)
    }
}

/// Double-buffered screen
///
/// Owns the arena its back grid lives in and the device the front grid
/// is shown on.
pub struct Screen<S, D> {
    arena: Arena<S>,
    back: Block,
    device: D,
    presents: u64,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>, D: Surface> Screen<S, D> {
    /// Allocate the back grid and blank both grids
    pub fn new(mut arena: Arena<S>, device: D) -> Result<Self, ArenaError> {
        let back = arena.allocate(GRID_BYTES)?;
        let mut screen = Screen {
            arena,
            back,
            device,
            presents: 0,
        };

        let blank = Cell::blank(Attribute::DEFAULT);
        for index in 0..CELL_COUNT {
            screen.store(index, blank);
            screen.device.write_cell(index, blank);
        }
        Ok(screen)
    }

    /// Draw one cell into the back grid
    ///
    /// Coordinates must be on the grid; anything else is dropped.
    pub fn set_cell(&mut self, x: usize, y: usize, glyph: u8, attribute: Attribute) {
        debug_assert!(x < WIDTH && y < HEIGHT, "cell ({x}, {y}) is off the grid");
        if x < WIDTH && y < HEIGHT {
            self.store(y * WIDTH + x, Cell::new(glyph, attribute));
        }
    }

    /// Clear the back grid to spaces in `attribute`
    pub fn fill(&mut self, attribute: Attribute) {
        let blank = Cell::blank(attribute);
        for index in 0..CELL_COUNT {
            self.store(index, blank);
        }
    }

    /// Paint `height` cells downwards from (`column`, `start_row`)
    pub fn draw_vertical_bar(&mut self, column: usize, start_row: usize, height: usize, attribute: Attribute) {
        for row in start_row..start_row + height {
            self.set_cell(column, row, b' ', attribute);
        }
    }

    /// Write `text` left to right from (`x`, `y`), clipped at the right edge
    pub fn write_str_at(&mut self, x: usize, y: usize, text: &str, attribute: Attribute) {
        for (column, byte) in (x..WIDTH).zip(text.bytes()) {
            let glyph = if byte.is_ascii() { byte } else { b'?' };
            self.set_cell(column, y, glyph, attribute);
        }
    }

    /// A [`fmt::Write`] cursor starting at (`x`, `y`)
    pub fn text(&mut self, x: usize, y: usize, attribute: Attribute) -> TextCursor<'_, S, D> {
        TextCursor {
            screen: self,
            x,
            y,
            attribute,
        }
    }

    /// Copy the back grid onto the device
    pub fn present(&mut self) {
        for index in 0..CELL_COUNT {
            let cell = self.load(index);
            self.device.write_cell(index, cell);
        }
        self.presents += 1;
        trace!(trace, frame = self.presents, "frame presented");
    }

    /// Cell in the back grid
    pub fn back_cell(&self, x: usize, y: usize) -> Cell {
        self.load(y * WIDTH + x)
    }

    /// Cell currently on the device
    pub fn front_cell(&self, x: usize, y: usize) -> Cell {
        self.device.read_cell(y * WIDTH + x)
    }

    /// Frames presented so far
    pub fn presents(&self) -> u64 {
        self.presents
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn arena(&self) -> &Arena<S> {
        &self.arena
    }

    /// Release the back grid and hand back the arena and device
    pub fn into_parts(self) -> (Arena<S>, D) {
        let Screen {
            mut arena, back, device, ..
        } = self;
        // `back` was allocated from this arena and is still live
        let released = arena.deallocate(back);
        debug_assert!(released.is_ok(), "back grid was not live: {released:?}");
        (arena, device)
    }

    fn store(&mut self, index: usize, cell: Cell) {
        let at = self.back.offset() + index * 2;
        self.arena.region_mut()[at..at + 2].copy_from_slice(&cell.0.to_le_bytes());
    }

    fn load(&self, index: usize) -> Cell {
        let at = self.back.offset() + index * 2;
        let region = self.arena.region();
        Cell(u16::from_le_bytes([region[at], region[at + 1]]))
    }
}

/// Text cursor into a screen's back grid, see [`Screen::text`]
pub struct TextCursor<'a, S, D> {
    screen: &'a mut Screen<S, D>,
    x: usize,
    y: usize,
    attribute: Attribute,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>, D: Surface> fmt::Write for TextCursor<'_, S, D> {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        if self.x < WIDTH {
            self.screen.write_str_at(self.x, self.y, text, self.attribute);
        }
        self.x += text.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;
    use pretty_assertions::assert_eq;

    const RED: Attribute = Attribute::new(Color::White, Color::Red);

    fn screen() -> Screen<Vec<u8>, MemorySurface> {
        Screen::new(Arena::new(vec![0u8; 8192]).unwrap(), MemorySurface::new()).unwrap()
    }

    #[test]
    fn test_attribute_packing() {
        let attr = Attribute::new(Color::Yellow, Color::Blue);
        assert_eq!(attr.0, 0x1E);
        assert_eq!(attr.foreground(), Color::Yellow);
        assert_eq!(attr.background(), Color::Blue);
        assert_eq!(Attribute::new(Color::White, Color::White).0, 0xFF);
    }

    #[test]
    fn test_cell_packing() {
        let cell = Cell::new(b'A', Attribute::DEFAULT);
        assert_eq!(cell.0, 0x0741);
        assert_eq!(cell.glyph(), b'A');
        assert_eq!(cell.attribute(), Attribute::DEFAULT);
    }

    #[test]
    fn test_new_blanks_both_grids() {
        let screen = screen();
        let blank = Cell::blank(Attribute::DEFAULT);
        assert!(screen.device().cells().iter().all(|&c| c == blank));
        assert_eq!(screen.back_cell(79, 24), blank);
    }

    #[test]
    fn test_new_fails_on_exhausted_arena() {
        let mut arena = Arena::new(vec![0u8; 8192]).unwrap();
        let _hog = arena.allocate(6000).unwrap();
        let result = Screen::new(arena, MemorySurface::new());
        assert_eq!(result.err(), Some(ArenaError::Exhausted { requested: GRID_BYTES }));
    }

    #[test]
    fn test_back_grid_is_allocated_from_the_arena() {
        let screen = screen();
        let stats = screen.arena().stats();
        assert_eq!(stats.free_bytes, 8192 - 16 - GRID_BYTES);
    }

    #[test]
    fn test_draws_are_invisible_until_present() {
        let mut screen = screen();
        screen.fill(Attribute(0x00));
        screen.set_cell(10, 5, b'*', RED);
        screen.draw_vertical_bar(0, 3, 5, RED);
        screen.write_str_at(2, 0, "hi", Attribute::DEFAULT);

        let untouched = Cell::blank(Attribute::DEFAULT);
        assert!(screen.device().cells().iter().all(|&c| c == untouched));

        screen.present();
        assert_eq!(screen.front_cell(10, 5), Cell::new(b'*', RED));
        assert_eq!(screen.front_cell(0, 7), Cell::blank(RED));
        assert_eq!(screen.front_cell(0, 8), Cell::blank(Attribute(0x00)));
        assert_eq!(screen.front_cell(3, 0).glyph(), b'i');
        assert_eq!(screen.presents(), 1);
    }

    #[test]
    fn test_front_keeps_last_frame_while_drawing_next() {
        let mut screen = screen();
        screen.set_cell(1, 1, b'a', RED);
        screen.present();
        screen.fill(Attribute(0x00));
        assert_eq!(screen.front_cell(1, 1), Cell::new(b'a', RED));
        assert_eq!(screen.back_cell(1, 1), Cell::blank(Attribute(0x00)));
    }

    #[test]
    fn test_present_copies_every_cell() {
        let mut screen = screen();
        let before = screen.device().writes();
        screen.present();
        assert_eq!(screen.device().writes() - before, CELL_COUNT);
    }

    #[test]
    fn test_text_is_clipped_at_right_edge() {
        let mut screen = screen();
        screen.write_str_at(78, 2, "abcd", RED);
        assert_eq!(screen.back_cell(78, 2).glyph(), b'a');
        assert_eq!(screen.back_cell(79, 2).glyph(), b'b');
        assert_eq!(screen.back_cell(0, 3).glyph(), b' ');
    }

    #[test]
    fn test_text_cursor_formats_numbers() {
        let mut screen = screen();
        write!(screen.text(5, 0, Attribute::DEFAULT), "{}: {}", 1, 42).unwrap();
        let row: Vec<u8> = (5..10).map(|x| screen.back_cell(x, 0).glyph()).collect();
        assert_eq!(row, b"1: 42".to_vec());
    }

    #[test]
    fn test_into_parts_returns_grid_memory() {
        let screen = screen();
        let (arena, _device) = screen.into_parts();
        assert_eq!(arena.stats().free_bytes, 8192 - 16);
        assert_eq!(arena.stats().free_blocks, 2);
    }
}
