//! # scenario-tests
//!
//! Multi-node test harness for inperson sync.
//!
//! This crate runs several complete nodes (event store, friend directory,
//! coordinator) in one process, linked by the loopback transport, and checks
//! what they converge to:
//! - Convergence of responses and invites across friends
//! - Creator authority and past-event immutability
//! - The private-event visibility boundary
//! - Session loss and reconnection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod harness;

pub mod scenarios;
