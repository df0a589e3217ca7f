use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::palette::{ColorId, Palette};
use crate::resize::{resize, SmallImage};
use crate::{Canvas, PlayerError, Result};

/// One tick's quantized output. Cells are stored column-major: every cell of
/// column 0 top to bottom, then column 1, and so on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<ColorId>,
}

impl Grid {
    /// Quantizes every cell of `small` against `palette`, walking columns in
    /// the outer loop.
    pub fn quantize(small: &SmallImage, palette: &Palette) -> Self {
        let (width, height) = (small.width(), small.height());
        let mut cells = Vec::with_capacity(small.len());
        for x in 0..width {
            for y in 0..height {
                cells.push(palette.nearest(small.rgb(x, y)));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color of the cell at column `x`, row `y`. Cells are stored column-major.
    pub fn get(&self, x: u32, y: u32) -> ColorId {
        self.cells[(x * self.height + y) as usize]
    }

    /// Cells in sink order.
    pub fn cells(&self) -> &[ColorId] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Resize followed by quantization: the work done off the pacing thread.
#[derive(Debug, Clone)]
pub struct Transform {
    pub width: u32,
    pub height: u32,
    pub palette: Palette,
}

impl Transform {
    pub fn new(width: u32, height: u32, palette: Palette) -> Self {
        Self {
            width,
            height,
            palette,
        }
    }

    /// Downsamples `canvas` to the grid size and snaps each cell to the palette.
    pub fn apply(&self, canvas: &Canvas) -> Grid {
        let small = resize(canvas, self.width, self.height);
        Grid::quantize(&small, &self.palette)
    }
}

/// Destination for rendered grids.
pub trait DisplaySink: Send {
    fn present(&mut self, grid: &Grid) -> Result<()>;

    /// Called once after the last grid.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Draws grids as background-colored blanks using ANSI escape sequences.
pub struct AnsiTerminalSink<W: Write + Send> {
    out: W,
    buffer: String,
    started: bool,
}

impl<W: Write + Send> AnsiTerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            buffer: String::new(),
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl AnsiTerminalSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> DisplaySink for AnsiTerminalSink<W> {
    fn present(&mut self, grid: &Grid) -> Result<()> {
        self.buffer.clear();
        if !self.started {
            // Hide cursor and clear once.
            self.buffer.push_str("\x1b[?25l\x1b[2J");
            self.started = true;
        }
        self.buffer.push_str("\x1b[H");

        for y in 0..grid.height() {
            let mut current = None;
            for x in 0..grid.width() {
                let color = grid.get(x, y);
                if current != Some(color) {
                    self.buffer
                        .push_str(&format!("\x1b[{}m", color.ansi_background()));
                    current = Some(color);
                }
                self.buffer.push(' ');
            }
            self.buffer.push_str("\x1b[0m");
            if y + 1 < grid.height() {
                self.buffer.push_str("\r\n");
            }
        }

        self.out.write_all(self.buffer.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.write_all(b"\x1b[0m\x1b[H\x1b[?25h")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Keeps every presented grid in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    grids: Arc<Mutex<Vec<Grid>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the collected grids; stays valid after the sink moves
    /// into the transform worker.
    pub fn grids(&self) -> Arc<Mutex<Vec<Grid>>> {
        self.grids.clone()
    }
}

impl DisplaySink for MemorySink {
    fn present(&mut self, grid: &Grid) -> Result<()> {
        self.grids
            .lock()
            .map_err(|_| PlayerError::msg("grid store has been poisoned"))?
            .push(grid.clone());
        Ok(())
    }
}
