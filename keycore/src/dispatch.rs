//! Dispatcher task: scan cadence, key-state updates and report synthesis.
//!
//! Each pass samples the matrix, feeds the transitions into the tracker,
//! then walks the tracked keys twice: once to apply layer changes, once to
//! resolve actions into the outgoing report. Layer changes go first so keys
//! pressed together with a layer key already resolve on the new layer; a
//! tapped macro runs last, once the pass report is final.

use anyhow::ensure;
use embassy_time::{Duration, Timer};

use crate::action::KeyAction;
use crate::hid;
use crate::keymap::Keymap;
use crate::macros::{MacroEngine, MacroTable, KEY_REGISTER_DELAY};
use crate::report::Report;
use crate::scan::ScanSource;
use crate::sink::CommandSender;
use crate::time::Tick;
use crate::tracker::KeyTracker;

/// Default pause between matrix samples; doubles as switch debounce.
pub const DEFAULT_SCAN_CADENCE: Duration = Duration::from_millis(30);

/// Default duration bounding tap detection.
pub const DEFAULT_TAPPING_INTERVAL: Duration = Duration::from_millis(200);

/// Timing configuration for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Sleep between matrix samples.
    pub scan_cadence: Duration,
    /// Upper bound on the press-to-release time of a tap.
    pub tapping_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_cadence: DEFAULT_SCAN_CADENCE,
            tapping_interval: DEFAULT_TAPPING_INTERVAL,
        }
    }
}

/// Drives the scan, track, resolve, report pipeline against a scan source
/// and the sink queue.
pub struct Dispatcher<'a, S, const ROLLOVER: usize = 16> {
    scanner: S,
    tracker: KeyTracker<ROLLOVER>,
    keymap: Keymap<'a>,
    engine: MacroEngine<'a>,
    sink: CommandSender,
    current_layer: u8,
    last_state_tick: Tick,
    config: Config,
}

impl<'a, S: ScanSource, const ROLLOVER: usize> Dispatcher<'a, S, ROLLOVER> {
    /// Builds a dispatcher over its collaborators.
    ///
    /// # Errors
    ///
    /// Fails when the keymap geometry does not match the scanner's matrix.
    pub fn new(
        scanner: S,
        keymap: Keymap<'a>,
        macros: MacroTable<'a>,
        sink: CommandSender,
        config: Config,
    ) -> anyhow::Result<Self> {
        ensure!(
            keymap.rows() == S::ROWS && keymap.cols() == S::COLS,
            "keymap geometry {}x{} does not match the {}x{} matrix",
            keymap.rows(),
            keymap.cols(),
            S::ROWS,
            S::COLS,
        );
        Ok(Self {
            scanner,
            tracker: KeyTracker::new(config.tapping_interval),
            keymap,
            engine: MacroEngine::new(macros),
            sink,
            current_layer: 0,
            last_state_tick: Tick::ZERO,
            config,
        })
    }

    /// Task loop: initializes the scanner, then runs one [`Self::pass`] per
    /// scan cadence until the task is torn down.
    ///
    /// # Errors
    ///
    /// Fails when scanner setup fails; the steady-state loop never returns
    /// an error.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.scanner.setup()?;
        loop {
            Timer::after(self.config.scan_cadence).await;
            self.pass(Tick::now()).await;
        }
    }

    /// One dispatcher pass: sample the matrix, update tracked keys, resolve
    /// the active layer and actions, and queue the resulting reports.
    pub async fn pass(&mut self, now: Tick) {
        if self.scanner.scan() {
            self.log_matrix();
        }
        self.track_transitions(now);

        let mut report = Report::new();
        let mut pending_macro = 0u8;

        // Layer pass: transitions observed this pass move the active layer
        // before any action resolves against it.
        for key in self.tracker.slots() {
            if key.scancode == 0 || !key.event_time.at_or_after(self.last_state_tick) {
                continue;
            }
            let KeyAction::Layer { id, momentary } =
                self.keymap.load(self.current_layer, key.scancode)
            else {
                continue;
            };
            if key.down {
                self.current_layer = id;
                log::info!("layer {id} active");
            } else if momentary {
                self.current_layer = 0;
                log::info!("base layer restored");
            }
        }

        // Action pass.
        for key in self.tracker.slots() {
            if key.scancode == 0 {
                continue;
            }
            let action = self.keymap.load(self.current_layer, key.scancode);

            if key.down {
                match action {
                    KeyAction::Basic { code, mods } => {
                        if action.is_inert() {
                            continue;
                        }
                        report.mods |= mods;
                        if let Some(bit) = hid::modifier_bit(code) {
                            report.mods |= bit;
                        } else if code != hid::NO_EVENT {
                            report.add_key(code);
                        }
                    }
                    // Held down, only the modifiers show; the code is
                    // reserved for a tap.
                    KeyAction::DualRole { mods, .. } => report.mods |= mods,
                    KeyAction::Consumer { usage } => self.sink.consumer_key(usage),
                    KeyAction::System { usage } => self.sink.system_key(usage),
                    // Macros fire on release; layers were handled above.
                    KeyAction::Macro { .. } | KeyAction::Layer { .. } | KeyAction::NoEvent => {}
                }
            } else if key.event_time.after(self.last_state_tick) {
                // Freshly released this pass.
                match action {
                    KeyAction::DualRole { code, .. } => {
                        if self.tracker.tap(key) {
                            // Flush the modifier-only state first so the
                            // held modifiers do not bleed into the tap; a
                            // press landing during this delay is observed on
                            // the next pass.
                            let mut flush = Report::new();
                            flush.mods = report.mods;
                            self.sink.basic_report(flush);
                            Timer::after(KEY_REGISTER_DELAY).await;
                            report.add_key(code);
                        }
                    }
                    KeyAction::Macro { .. } => {
                        if self.tracker.tap(key) {
                            pending_macro = key.scancode;
                        }
                    }
                    KeyAction::Consumer { .. } => self.sink.consumer_key(0),
                    KeyAction::System { .. } => self.sink.system_key(0),
                    KeyAction::Basic { .. } | KeyAction::Layer { .. } | KeyAction::NoEvent => {}
                }
            }
        }

        if pending_macro != 0 {
            if let KeyAction::Macro { id } = self.keymap.load(self.current_layer, pending_macro) {
                self.engine.run(&report, id, &mut self.sink).await;
            }
        }

        self.sink.basic_report(report);
        self.last_state_tick = now;
    }

    /// Feeds every cell that flipped between the prior and current samples
    /// into the tracker.
    #[allow(clippy::cast_possible_truncation)]
    fn track_transitions(&mut self, now: Tick) {
        for row in 0..S::ROWS {
            let prior = self.scanner.prior()[row];
            let current = self.scanner.current()[row];
            if prior == current {
                continue;
            }
            for col in 0..S::COLS {
                let mask = 1 << col;
                if (prior ^ current) & mask != 0 {
                    let scancode = (row * S::COLS + col + 1) as u8;
                    let down = current & mask != 0;
                    if !self.tracker.update(scancode, down, now) {
                        log::warn!("tracker full, dropping scancode {scancode}");
                    }
                }
            }
        }
    }

    fn log_matrix(&self) {
        log::debug!("matrix changed");
        for row in 0..S::ROWS {
            let bits = self.scanner.current()[row];
            let mut line = String::with_capacity(S::COLS);
            for col in 0..S::COLS {
                line.push(if bits & (1 << col) != 0 { '1' } else { '0' });
            }
            log::debug!("row{row} {line}");
        }
    }
}
