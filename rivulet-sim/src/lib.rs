//! Rivulet Simulation - a stand-in swarm for development and tests.
//!
//! [`SimulatedSwarm`] fills an in-memory piece store at a configurable rate,
//! honouring selections, stream interests and pause exactly like a real swarm
//! would: unwanted pieces never arrive. [`DemoTorrent`] builds a torrent from
//! a local directory and wires it to a simulated swarm.

#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]

pub mod demo;
pub mod swarm;

pub use demo::{DemoTorrent, layout_for_directory};
pub use swarm::SimulatedSwarm;
