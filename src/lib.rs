//! IP fragment reassembly
//!
//! One engine, parameterized per protocol, rebuilds IPv4 and IPv6 datagrams
//! from fragments that may arrive in any order, more than once, overlapping,
//! or not at all.
//!
//! * [ReassemblyEngine] is the thread-safe entry point for one protocol.
//! * [NetReassembly] pairs an IPv4 and an IPv6 engine over one [MemoryBudget].
//! * [ProtocolPolicy] selects overlap handling, eviction, limits and timers.
//! * [ReassemblySink] receives completed datagrams and error signals.
//!
//! Memory is bounded twice: by the number of buffered fragments and by the
//! number of datagrams under reassembly. Stale reassemblies expire after a
//! number of timer ticks driven by [ReassemblyEngine::age_by_ticks] or by the
//! [SlowTimeout] background task.

#[macro_use]
mod log_thru;

mod fragment_entry;
mod fragment_key;
mod ipv4;
mod ipv6;
mod net_reassembly;
mod packet_buffer;
mod protocol_policy;
mod reassembly_config;
mod reassembly_engine;
mod reassembly_queue;
mod reassembly_result;
mod reassembly_sink;
mod reassembly_stats;
mod reassembly_table;
#[cfg(any(feature = "rt-tokio", feature = "rt-async-std"))]
mod slow_timeout;

pub use std::collections::VecDeque;
pub use std::fmt;
pub use std::future::Future;
pub use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
pub use std::sync::atomic::Ordering;
pub use std::sync::Arc;
pub use std::time::Duration;

pub use eyre::{bail, ensure, eyre, Report as EyreReport, Result as EyreResult, WrapErr};

pub use fragment_entry::*;
pub use fragment_key::*;
pub use ipv4::*;
pub use ipv6::*;
pub use net_reassembly::*;
pub use packet_buffer::*;
pub use protocol_policy::*;
pub use reassembly_config::*;
pub use reassembly_engine::*;
pub use reassembly_queue::*;
pub use reassembly_result::*;
pub use reassembly_sink::*;
pub use reassembly_stats::*;
pub use reassembly_table::*;
#[cfg(any(feature = "rt-tokio", feature = "rt-async-std"))]
pub use slow_timeout::*;


cfg_if! {
    if #[cfg(feature = "tracing")] {
        use tracing::*;
    } else {
        use log::*;
    }
}
use cfg_if::*;
use parking_lot::*;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
