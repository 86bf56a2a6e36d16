//! In-process actor runtime for the ledger
//!
//! This crate implements the actor substrate the coordinator runs on,
//! following the contract of the production message bus: addressable
//! actors, fire-and-forget envelope delivery with at-most-once semantics,
//! spawn-on-first-delivery, and timer-driven deliveries for reply
//! timeouts. The production transport (the networked lake) lives outside
//! this repository; processes under test and the host binary wire this
//! in-process bus instead.

mod message;
mod runtime;

pub use message::{Coordinates, Envelope, Message};
pub use runtime::{Actor, ActorFactory, Context, Flow, Lake};
