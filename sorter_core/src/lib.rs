#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core sorting logic (hardware-agnostic).
//!
//! This crate provides the carousel sequencing engine. All hardware
//! interactions go through the `sorter_traits::Stepper`, `Servo` and
//! `HostLink` traits.
//!
//! ## Architecture
//!
//! - **Slot ring**: per-slot bean bookkeeping addressed by logical position (`slot_ring`)
//! - **Motion**: one-cell advances with even remainder distribution (`motion`)
//! - **Actuators**: gate, feed rollers and defect ejection (`actuators`, `eject`)
//! - **Protocol**: host line codec (`protocol`) and transports (`link`, `classifier`)
//! - **State machine**: deadline-driven sequencing (`fsm`), driven by `runner`
//!
//! ## Positions
//!
//! Position 0 is the feed point. A bean fed at position 0 sits at position
//! `k` after `k` one-cell advances.

pub mod actuators;
pub mod builder;
pub mod classifier;
pub mod config;
pub mod conversions;
pub mod eject;
pub mod error;
pub mod fsm;
pub mod hw_error;
pub mod link;
pub mod mocks;
pub mod motion;
pub mod protocol;
pub mod runner;
pub mod slot_ring;
pub mod status;

pub use builder::{Missing, Set, SorterBuilder};
pub use classifier::{AutoClassifier, StubVerdict};
pub use config::*;
pub use eject::{ActuatedFlap, DefectEjector, PassiveDrop};
pub use error::{BuildError, FaultKind, Result, SorterError};
pub use fsm::{SortState, SortStats, Sorter};
pub use link::LineLink;
pub use protocol::{AdminCommand, Classification, Inbound, JogMove, Outbound, parse_line};
pub use runner::{RunOptions, RunOutcome};
pub use slot_ring::{BeanId, BeanState, Slot, SlotRing};
pub use status::SortStatus;
