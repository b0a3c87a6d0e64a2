//! Key-processing core for a programmable mechanical keyboard.
//!
//! The crate covers everything between the switch matrix and the host
//! transport: a fixed-cadence scan loop, a bounded key-state tracker with
//! tap-versus-hold timing, a layered keymap of packed 16-bit actions, a
//! macro interpreter, and the dispatcher that turns all of it into
//! boot-keyboard and extra-key reports.
//!
//! The hardware edges are traits. A [`scan::ScanSource`] supplies row
//! bitmaps of the matrix; a [`sink::HostEndpoint`] carries wire bytes to the
//! host over USB or BLE. The embedding firmware constructs both at boot,
//! creates the sink queue with [`sink::command_queue`], and joins the
//! [`dispatch::Dispatcher::run`] and [`sink::HostLink::run`] task futures on
//! its executor.

pub mod action;
pub mod dispatch;
pub mod hid;
pub mod keymap;
pub mod macros;
pub mod report;
pub mod scan;
pub mod sink;
pub mod time;
pub mod tracker;
