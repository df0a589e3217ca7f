use serde::{Deserialize, Serialize};

use crate::{PlayerError, Result};

/// 8-bit RGB triple as stored in palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Manhattan distance over the three color channels.
    pub fn l1_distance(self, other: Rgb) -> u32 {
        self.0.abs_diff(other.0) as u32
            + self.1.abs_diff(other.1) as u32
            + self.2.abs_diff(other.2) as u32
    }
}

/// Symbolic cell color understood by the display sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorId {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl ColorId {
    /// ANSI SGR parameter selecting this color as a cell background.
    pub fn ansi_background(self) -> u8 {
        match self {
            ColorId::Default => 49,
            ColorId::Black => 40,
            ColorId::Red => 41,
            ColorId::Green => 42,
            ColorId::Yellow => 43,
            ColorId::Blue => 44,
            ColorId::Magenta => 45,
            ColorId::Cyan => 46,
            ColorId::White => 47,
        }
    }
}

/// Reference color paired with the id a cell takes when it snaps to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub rgb: Rgb,
    pub id: ColorId,
}

impl PaletteEntry {
    pub const fn new(rgb: Rgb, id: ColorId) -> Self {
        Self { rgb, id }
    }
}

/// Ordered, non-empty list of palette entries. Order matters: quantization
/// ties resolve to the earliest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PaletteEntry>", into = "Vec<PaletteEntry>")]
pub struct Palette {
    entries: Vec<PaletteEntry>,
}

impl Palette {
    /// Builds a palette from `entries` in order; an empty list is rejected.
    pub fn new(entries: Vec<PaletteEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PlayerError::InvalidConfig(
                "palette must contain at least one entry".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Two-tone palette of the classic console player: near-black then light gray.
    pub fn monochrome() -> Self {
        Self {
            entries: vec![
                PaletteEntry::new(Rgb(12, 12, 12), ColorId::Black),
                PaletteEntry::new(Rgb(204, 204, 204), ColorId::White),
            ],
        }
    }

    /// Entries in tie-breaking order.
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the id of the entry nearest to `sample`.
    ///
    /// Entries are scanned in order and only a strictly smaller distance
    /// replaces the current best, so equidistant entries resolve to the
    /// earliest one.
    pub fn nearest(&self, sample: Rgb) -> ColorId {
        let mut best = self.entries[0];
        let mut best_distance = sample.l1_distance(best.rgb);

        for entry in &self.entries[1..] {
            let distance = sample.l1_distance(entry.rgb);
            if distance < best_distance {
                best_distance = distance;
                best = *entry;
            }
        }

        best.id
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::monochrome()
    }
}

impl TryFrom<Vec<PaletteEntry>> for Palette {
    type Error = PlayerError;

    fn try_from(entries: Vec<PaletteEntry>) -> Result<Self> {
        Self::new(entries)
    }
}

impl From<Palette> for Vec<PaletteEntry> {
    fn from(palette: Palette) -> Self {
        palette.entries
    }
}
