//! Layered, read-only keymap lookup.

use anyhow::ensure;

use crate::action::KeyAction;

/// Read-only view over a flash-resident keymap table.
///
/// The table is a contiguous array of 16-bit [`KeyAction`] records, row-major
/// within each layer, with a layer stride of `rows * cols`. Lookups on a
/// non-base layer fall through to the base layer when the cell is the
/// all-zero transparent record.
#[derive(Debug, Clone, Copy)]
pub struct Keymap<'a> {
    entries: &'a [u16],
    layers: usize,
    rows: usize,
    cols: usize,
}

impl<'a> Keymap<'a> {
    /// Wraps a record table, validating it against the declared geometry.
    ///
    /// # Errors
    ///
    /// Fails when the table length does not match `layers * rows * cols`.
    pub fn new(entries: &'a [u16], layers: usize, rows: usize, cols: usize) -> anyhow::Result<Self> {
        ensure!(
            layers >= 1,
            "a keymap needs at least the base layer, got {layers}"
        );
        ensure!(
            entries.len() == layers * rows * cols,
            "keymap table holds {} records, {layers} layers of {rows}x{cols} need {}",
            entries.len(),
            layers * rows * cols,
        );
        Ok(Self {
            entries,
            layers,
            rows,
            cols,
        })
    }

    /// Number of layers in the table.
    #[must_use]
    pub const fn layers(&self) -> usize {
        self.layers
    }

    /// Number of matrix rows per layer.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of matrix columns per layer.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    fn cell(&self, layer: u8, scancode: u8) -> u16 {
        let stride = self.rows * self.cols;
        self.entries[layer as usize * stride + scancode as usize - 1]
    }

    /// Resolves the action for `scancode` on `layer`, falling back to the
    /// base layer when the cell is transparent. Layers beyond the table are
    /// clamped to the base layer.
    #[must_use]
    pub fn load(&self, layer: u8, scancode: u8) -> KeyAction {
        let layer = if (layer as usize) < self.layers {
            layer
        } else {
            0
        };
        let mut raw = self.cell(layer, scancode);
        if layer > 0 && raw == 0 {
            raw = self.cell(0, scancode);
        }
        KeyAction::decode(raw)
    }
}
