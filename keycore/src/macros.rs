//! Byte-coded macro interpretation.
//!
//! A macro is a flash-resident byte stream of `(opcode, operand)` pairs
//! terminated by [`Opcode::End`]. The engine replays the stream on top of a
//! starting report, pushing each intermediate report to the sink with enough
//! spacing for the host to register every keystroke.

use embassy_time::{Duration, Timer};
use num_enum::TryFromPrimitive;

use crate::hid;
use crate::report::Report;
use crate::sink::CommandSender;

/// Minimum separation between successive reports the host is observed to
/// require for reliable key registration.
pub const KEY_REGISTER_DELAY: Duration = Duration::from_millis(32);

/// Macro stream opcodes. [`Opcode::KeyDown`], [`Opcode::KeyUp`] and
/// [`Opcode::KeyToggle`] each consume one operand byte holding a HID usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// End of stream.
    End = 0,
    /// Press the usage in the next byte.
    KeyDown = 1,
    /// Release the usage in the next byte.
    KeyUp = 2,
    /// Toggle the usage in the next byte.
    KeyToggle = 3,
}

/// Read-only bank of macro definitions, indexed by macro id.
#[derive(Debug, Clone, Copy)]
pub struct MacroTable<'a> {
    streams: &'a [&'a [u8]],
}

impl<'a> MacroTable<'a> {
    /// A table with no macros, for keyboards that map none.
    pub const EMPTY: MacroTable<'static> = MacroTable { streams: &[] };

    /// Wraps the application's macro streams.
    #[must_use]
    pub const fn new(streams: &'a [&'a [u8]]) -> Self {
        Self { streams }
    }

    /// The byte stream for `id`, if the table defines one.
    #[must_use]
    pub fn lookup(&self, id: u16) -> Option<&'a [u8]> {
        self.streams.get(id as usize).copied()
    }
}

/// Interprets macro streams, temporarily owning the report stream.
pub struct MacroEngine<'a> {
    macros: MacroTable<'a>,
}

impl<'a> MacroEngine<'a> {
    /// Creates an engine over the application's macro table.
    #[must_use]
    pub const fn new(macros: MacroTable<'a>) -> Self {
        Self { macros }
    }

    /// Replays macro `id` on top of `starting`, emitting each intermediate
    /// report through `sink` with [`KEY_REGISTER_DELAY`] spacing.
    ///
    /// Modifier operations coalesce: consecutive modifier changes produce a
    /// single report at the next non-modifier operation or at end of stream.
    /// Unknown opcodes and truncated streams terminate the macro silently.
    pub async fn run(&self, starting: &Report, id: u16, sink: &mut CommandSender) {
        let Some(stream) = self.macros.lookup(id) else {
            log::warn!("macro {id} is not defined");
            return;
        };

        let mut report = *starting;
        let mut pending = false;
        let mut bytes = stream.iter();

        loop {
            let Some(&raw) = bytes.next() else {
                log::warn!("macro {id} has no end marker");
                return;
            };
            let Ok(op) = Opcode::try_from(raw) else {
                log::warn!("macro {id}: unknown opcode {raw:#04x}");
                return;
            };

            if op == Opcode::End {
                if pending {
                    sink.basic_report(report);
                    Timer::after(KEY_REGISTER_DELAY).await;
                }
                return;
            }

            let Some(&key) = bytes.next() else {
                log::warn!("macro {id} is truncated");
                return;
            };

            if let Some(bit) = hid::modifier_bit(key) {
                let set = match op {
                    Opcode::KeyDown => true,
                    Opcode::KeyUp => false,
                    // Toggle resolves against the working report.
                    _ => report.mods & bit == 0,
                };
                if set {
                    report.mods |= bit;
                } else {
                    report.mods &= !bit;
                }
                pending = true;
                continue;
            }

            match op {
                Opcode::KeyDown => report.add_key(key),
                Opcode::KeyUp => report.clear_key(key),
                _ => report.toggle_key(key),
            }
            sink.basic_report(report);
            Timer::after(KEY_REGISTER_DELAY).await;
            pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{self, Command};
    use futures::executor::block_on;

    fn run_macro(streams: &[&[u8]], id: u16, starting: Report) -> Vec<Command> {
        let (mut tx, mut rx) = sink::command_queue();
        let engine = MacroEngine::new(MacroTable::new(streams));
        block_on(engine.run(&starting, id, &mut tx));

        let mut sent = Vec::new();
        while let Ok(Some(cmd)) = rx.try_next() {
            sent.push(cmd);
        }
        sent
    }

    fn reports(sent: &[Command]) -> Vec<Report> {
        sent.iter()
            .map(|cmd| match cmd {
                Command::BasicReport(report) => *report,
                Command::ExtraKey { .. } => panic!("macro emitted an extra key"),
            })
            .collect()
    }

    #[test]
    fn modifier_then_key_emits_one_report() {
        let stream: &[u8] = &[
            Opcode::KeyDown as u8,
            hid::LEFT_GUI,
            Opcode::KeyDown as u8,
            0x06,
            Opcode::End as u8,
        ];
        let sent = run_macro(&[stream], 0, Report::new());
        let reports = reports(&sent);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mods, 0x08);
        assert_eq!(reports[0].keys[0], 0x06);
    }

    #[test]
    fn trailing_modifier_change_is_flushed_at_end() {
        let stream: &[u8] = &[
            Opcode::KeyDown as u8,
            0x04,
            Opcode::KeyUp as u8,
            0x04,
            Opcode::KeyDown as u8,
            hid::LEFT_SHIFT,
            Opcode::End as u8,
        ];
        let sent = run_macro(&[stream], 0, Report::new());
        let reports = reports(&sent);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].mods, 0x02);
        assert!(reports[2].keys.iter().all(|&k| k == 0));
    }

    #[test]
    fn modifier_toggle_resolves_against_working_state() {
        let stream: &[u8] = &[
            Opcode::KeyToggle as u8,
            hid::LEFT_CONTROL,
            Opcode::KeyToggle as u8,
            hid::LEFT_CONTROL,
            Opcode::KeyDown as u8,
            0x04,
            Opcode::End as u8,
        ];
        let sent = run_macro(&[stream], 0, Report::new());
        let reports = reports(&sent);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].mods, 0);
    }

    #[test]
    fn key_toggle_releases_a_held_key() {
        let mut starting = Report::new();
        starting.add_key(0x04);
        let stream: &[u8] = &[Opcode::KeyToggle as u8, 0x04, Opcode::End as u8];
        let sent = run_macro(&[stream], 0, starting);
        let reports = reports(&sent);
        assert_eq!(reports.len(), 1);
        assert!(reports[0].keys.iter().all(|&k| k == 0));
    }

    #[test]
    fn unknown_opcode_terminates_the_macro() {
        let stream: &[u8] = &[Opcode::KeyDown as u8, 0x04, 0x7F, 0x05];
        let sent = run_macro(&[stream], 0, Report::new());
        assert_eq!(reports(&sent).len(), 1);
    }

    #[test]
    fn truncated_stream_terminates_the_macro() {
        let stream: &[u8] = &[Opcode::KeyDown as u8];
        let sent = run_macro(&[stream], 0, Report::new());
        assert!(sent.is_empty());
    }

    #[test]
    fn undefined_macro_is_a_noop() {
        let sent = run_macro(&[], 9, Report::new());
        assert!(sent.is_empty());
    }

    #[test]
    fn macro_runs_on_top_of_the_starting_report() {
        let mut starting = Report::new();
        starting.mods = 0x02;
        let stream: &[u8] = &[Opcode::KeyDown as u8, 0x04, Opcode::End as u8];
        let sent = run_macro(&[stream], 0, starting);
        let reports = reports(&sent);
        assert_eq!(reports[0].mods, 0x02);
        assert_eq!(reports[0].keys[0], 0x04);
    }
}
