//! Report sink: the bounded command queue and the host-link task draining it.
//!
//! The dispatcher pushes commands into a small bounded queue and never
//! blocks on it; a full queue drops the command, and the next pass heals the
//! host's view. The host link owns the other end, deduplicates consecutive
//! identical keyboard reports and writes wire bytes to the transport.

use futures::channel::mpsc;
use futures::StreamExt;

use crate::hid::ReportId;
use crate::report::Report;

/// Depth of the dispatcher to host-link queue.
pub const QUEUE_DEPTH: usize = 8;

/// Commands crossing the dispatcher to host-link queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Push the current boot-keyboard state.
    BasicReport(Report),
    /// Extra-key usage on the given channel; usage 0 releases it.
    ExtraKey {
        /// Which extra-key report the usage belongs to.
        channel: ReportId,
        /// The usage to assert, 0 for release.
        usage: u16,
    },
}

/// Creates the bounded queue pair connecting dispatcher and host link.
#[must_use]
pub fn command_queue() -> (CommandSender, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
    (CommandSender { tx }, rx)
}

/// Sending half of the sink queue. Sends never block: when the queue is
/// full the command is dropped and logged.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Queues the current boot-keyboard report.
    pub fn basic_report(&mut self, report: Report) {
        self.send(Command::BasicReport(report));
    }

    /// Queues a consumer-control usage; 0 releases it.
    pub fn consumer_key(&mut self, usage: u16) {
        self.send(Command::ExtraKey {
            channel: ReportId::Consumer,
            usage,
        });
    }

    /// Queues a system-control usage; 0 releases it.
    pub fn system_key(&mut self, usage: u16) {
        self.send(Command::ExtraKey {
            channel: ReportId::System,
            usage,
        });
    }

    fn send(&mut self, command: Command) {
        if let Err(err) = self.tx.try_send(command) {
            if err.is_full() {
                log::warn!("sink queue full, dropping {:?}", err.into_inner());
            } else {
                log::warn!("sink queue disconnected");
            }
        }
    }
}

/// Packs a report into the 8-byte boot-keyboard wire format, inserting the
/// reserved byte.
#[must_use]
pub fn keyboard_wire(report: &Report) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[0] = report.mods;
    bytes[2..].copy_from_slice(&report.keys);
    bytes
}

/// Packs an extra-key usage into its 3-byte wire format: report ID followed
/// by the little-endian usage.
#[must_use]
pub fn extra_wire(channel: ReportId, usage: u16) -> [u8; 3] {
    let mut bytes = [0u8; 3];
    bytes[0] = channel.into();
    ssmarshal::serialize(&mut bytes[1..], &usage).ok();
    bytes
}

/// Transport endpoint the host link writes wire bytes to, USB or BLE facing.
#[allow(async_fn_in_trait)]
pub trait HostEndpoint {
    /// Writes an 8-byte boot-keyboard report.
    ///
    /// # Errors
    ///
    /// Propagates the transport failure; the host link drops the report.
    async fn write_keyboard(&mut self, bytes: &[u8; 8]) -> anyhow::Result<()>;

    /// Writes a 3-byte extra-key report.
    ///
    /// # Errors
    ///
    /// Propagates the transport failure; the host link drops the report.
    async fn write_extra(&mut self, bytes: &[u8; 3]) -> anyhow::Result<()>;
}

/// Sink task state: drains the command queue into a [`HostEndpoint`].
pub struct HostLink<E> {
    endpoint: E,
    last_report: Option<Report>,
}

impl<E: HostEndpoint> HostLink<E> {
    /// Wraps a transport endpoint.
    #[must_use]
    pub fn new(endpoint: E) -> Self {
        Self {
            endpoint,
            last_report: None,
        }
    }

    /// Task loop: receives commands until the queue closes. Consecutive
    /// identical keyboard reports are sent once; transport failures are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Currently none; the `Result` mirrors the task signature expected by
    /// the boot-time join.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<Command>) -> anyhow::Result<()> {
        while let Some(command) = rx.next().await {
            self.handle(command).await;
        }
        Ok(())
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::BasicReport(report) => {
                if self.last_report == Some(report) {
                    return;
                }
                log::debug!("report: {report:?}");
                match self.endpoint.write_keyboard(&keyboard_wire(&report)).await {
                    Ok(()) => self.last_report = Some(report),
                    Err(err) => log::warn!("keyboard report dropped: {err:#}"),
                }
            }
            Command::ExtraKey { channel, usage } => {
                if let Err(err) = self.endpoint.write_extra(&extra_wire(channel, usage)).await {
                    log::warn!("extra key dropped: {err:#}");
                }
            }
        }
    }
}
