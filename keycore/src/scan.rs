//! Matrix scan source contract and a column-expander scanner.

use anyhow::ensure;
use embassy_time::{block_for, Duration};

/// Bitmap of one matrix row; bit `n` set means the switch at column `n` is
/// pressed.
pub type RowBits = u16;

/// Provider of per-tick matrix samples.
///
/// Implementations keep the two most recent samples so the dispatcher can
/// diff them for transitions. Pressed keys are 1-bits; any active-low wire
/// encoding is normalized before the core sees it.
pub trait ScanSource {
    /// Number of matrix rows.
    const ROWS: usize;
    /// Number of matrix columns.
    const COLS: usize;

    /// One-time hardware initialization.
    ///
    /// # Errors
    ///
    /// Propagates the underlying bus or pin setup failure; fatal at boot.
    fn setup(&mut self) -> anyhow::Result<()>;

    /// Samples the matrix, shifting the previous sample into the prior view.
    /// Returns whether any bit changed since the previous call.
    fn scan(&mut self) -> bool;

    /// The most recent sample, one bitmap per row.
    fn current(&self) -> &[RowBits];

    /// The sample preceding the most recent one.
    fn prior(&self) -> &[RowBits];
}

/// Settle time between driving a row select line and reading the columns.
pub const ROW_SETTLE_DELAY: Duration = Duration::from_micros(30);

/// Row-select and column-read access to the matrix wiring, typically an I/O
/// expander behind I2C or SPI. The bus guard lives behind this trait; the
/// scanner only sequences selects and reads.
pub trait ColumnPort {
    /// One-time port initialization.
    ///
    /// # Errors
    ///
    /// Propagates the underlying bus or pin setup failure.
    fn setup(&mut self) -> anyhow::Result<()>;

    /// Drives the select line for `row` active and all other rows inactive.
    fn select_row(&mut self, row: usize);

    /// Raw column bits for the selected row. 0 means pressed on the wire.
    fn read_columns(&mut self) -> RowBits;
}

/// Column-driven matrix scanner over a [`ColumnPort`].
pub struct MatrixScanner<P, const ROWS: usize, const COLS: usize> {
    port: P,
    current: [RowBits; ROWS],
    prior: [RowBits; ROWS],
}

#[allow(clippy::cast_possible_truncation)]
const fn column_mask(cols: usize) -> RowBits {
    ((1u32 << cols) - 1) as RowBits
}

impl<P: ColumnPort, const ROWS: usize, const COLS: usize> MatrixScanner<P, ROWS, COLS> {
    /// Wraps a column port into a scanner with empty samples.
    #[must_use]
    pub fn new(port: P) -> Self {
        Self {
            port,
            current: [0; ROWS],
            prior: [0; ROWS],
        }
    }
}

impl<P: ColumnPort, const ROWS: usize, const COLS: usize> ScanSource
    for MatrixScanner<P, ROWS, COLS>
{
    const ROWS: usize = ROWS;
    const COLS: usize = COLS;

    fn setup(&mut self) -> anyhow::Result<()> {
        ensure!(ROWS >= 1 && ROWS <= 8, "row select supports 1..=8 rows");
        ensure!(COLS >= 1 && COLS <= 16, "column port supports 1..=16 columns");
        self.port.setup()?;
        self.current = [0; ROWS];
        self.prior = [0; ROWS];
        Ok(())
    }

    fn scan(&mut self) -> bool {
        self.prior = self.current;
        let mut changed = false;

        for row in 0..ROWS {
            self.port.select_row(row);
            block_for(ROW_SETTLE_DELAY);

            // The wire reads 0 for pressed; invert for more rational use.
            let bits = !self.port.read_columns() & column_mask(COLS);
            if bits != self.prior[row] {
                changed = true;
            }
            self.current[row] = bits;
        }

        changed
    }

    fn current(&self) -> &[RowBits] {
        &self.current
    }

    fn prior(&self) -> &[RowBits] {
        &self.prior
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Column port reading from a canned frame; all bits idle (high) unless
    /// pressed in the frame.
    struct FakePort {
        frame: [RowBits; 2],
        selected: usize,
        selects: Vec<usize>,
    }

    impl FakePort {
        fn new() -> Self {
            Self {
                frame: [0; 2],
                selected: 0,
                selects: Vec::new(),
            }
        }
    }

    impl ColumnPort for FakePort {
        fn setup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn select_row(&mut self, row: usize) {
            self.selected = row;
            self.selects.push(row);
        }

        fn read_columns(&mut self) -> RowBits {
            // Active low: pressed bits read as 0.
            !self.frame[self.selected]
        }
    }

    #[test]
    fn scan_normalizes_active_low_columns() {
        let mut scanner: MatrixScanner<FakePort, 2, 8> = MatrixScanner::new(FakePort::new());
        scanner.setup().unwrap();

        scanner.port.frame = [0b0000_0101, 0];
        assert!(scanner.scan());
        assert_eq!(scanner.current(), &[0b0000_0101, 0]);
        assert_eq!(scanner.prior(), &[0, 0]);
    }

    #[test]
    fn scan_shifts_current_into_prior() {
        let mut scanner: MatrixScanner<FakePort, 2, 8> = MatrixScanner::new(FakePort::new());
        scanner.setup().unwrap();

        scanner.port.frame = [1, 0];
        assert!(scanner.scan());
        scanner.port.frame = [1, 2];
        assert!(scanner.scan());
        assert_eq!(scanner.prior(), &[1, 0]);
        assert_eq!(scanner.current(), &[1, 2]);
    }

    #[test]
    fn unchanged_matrix_reports_no_change() {
        let mut scanner: MatrixScanner<FakePort, 2, 8> = MatrixScanner::new(FakePort::new());
        scanner.setup().unwrap();

        scanner.port.frame = [4, 0];
        assert!(scanner.scan());
        assert!(!scanner.scan());
    }

    #[test]
    fn every_row_is_selected_per_scan() {
        let mut scanner: MatrixScanner<FakePort, 2, 8> = MatrixScanner::new(FakePort::new());
        scanner.setup().unwrap();
        scanner.scan();
        assert_eq!(scanner.port.selects, vec![0, 1]);
    }

    #[test]
    fn column_mask_bounds_wide_ports() {
        let mut scanner: MatrixScanner<FakePort, 1, 4> = MatrixScanner::new(FakePort::new());
        scanner.setup().unwrap();
        // Idle lines above the matrix width must not read as presses.
        scanner.port.frame[0] = 0b1111_0000;
        assert!(!scanner.scan());
        assert_eq!(scanner.current(), &[0]);
    }

    #[test]
    fn geometry_limits_are_enforced() {
        let mut scanner: MatrixScanner<FakePort, 2, 17> = MatrixScanner::new(FakePort::new());
        assert!(scanner.setup().is_err());
    }
}
