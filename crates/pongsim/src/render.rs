//! Text rendering of the simulated display

use pongos::display::{Cell, Color, HEIGHT, MemorySurface, WIDTH};
use std::fmt::Write;

/// Character shown for one cell
///
/// Printable glyphs show as themselves. Blank cells on a colored
/// background show as `#` so paddles and the ball stay visible.
pub fn cell_char(cell: Cell) -> char {
    match cell.glyph() {
        b' ' | 0 => {
            if cell.attribute().background() == Color::Black {
                ' '
            } else {
                '#'
            }
        }
        glyph if glyph.is_ascii_graphic() => glyph as char,
        _ => '?',
    }
}

/// One row of the surface, trailing blanks included
pub fn render_row(surface: &MemorySurface, y: usize) -> String {
    surface.row(y).iter().copied().map(cell_char).collect()
}

/// The whole surface inside a border
pub fn render_frame(surface: &MemorySurface) -> String {
    let rule = format!("+{}+", "-".repeat(WIDTH));
    let mut out = String::with_capacity((WIDTH + 3) * (HEIGHT + 2));

    out.push_str(&rule);
    out.push('\n');
    for y in 0..HEIGHT {
        let _ = writeln!(out, "|{}|", render_row(surface, y));
    }
    out.push_str(&rule);
    out.push('\n');
    out
}
