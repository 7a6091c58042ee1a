//! Trackway Core -- route description compiler and track geometry engine.
//!
//! This crate turns textual route descriptions into a finalized array of
//! track elements, and provides a follower that interpolates world-space
//! poses along that array while firing the events it crosses.
//!
//! # Compile Pipeline
//!
//! Each call to [`script::compile`] runs the following stages:
//!
//! 1. **Split** -- Source lines become located expressions.
//! 2. **Resolve** -- Namespaces, prefixes and track positions are resolved
//!    and statements are stably sorted by track position.
//! 3. **Interpret** -- `Track.*` commands mutate the per-block store through
//!    an enum-indexed dispatch table.
//! 4. **Build** -- Blocks are walked into world-space [`element::TrackElement`]s
//!    with their events attached.
//!
//! Nothing in the pipeline fails on route content. Malformed input is
//! replaced by documented defaults and reported as a
//! [`diagnostics::Diagnostic`]; only cancellation aborts a compile.
//!
//! ```rust,ignore
//! let input = CompileInput::new("route.csv", &text, &options, &catalog);
//! let route = compile(&input, None)?;
//! let mut follower = TrackFollower::new(TriggerType::TrainFront, route.rail_gauge);
//! let mut ctx = TriggerContext::new();
//! follower.advance(&route.elements, 120.0, true, false, &mut ctx);
//! ```
//!
//! # Key Types
//!
//! - [`context::ParseContext`] -- State threaded through every handler.
//! - [`block::RouteData`] -- Per-block store built during one parse.
//! - [`command::TrackCommand`] -- Every supported track command.
//! - [`catalog::Catalog`] -- Existence queries for referenced structures.
//! - [`element::Route`] -- Compiled, immutable route output.
//! - [`event::EventKind`] -- Tagged track events with forward and
//!   backward semantics.
//! - [`follower::TrackFollower`] -- Continuous-position cursor.
//! - [`serialize`] -- Versioned route snapshots via bitcode.

pub mod block;
pub mod builder;
pub mod cancel;
pub mod catalog;
pub mod command;
pub mod context;
pub mod diagnostics;
pub mod element;
pub mod event;
pub mod follower;
pub mod interpreter;
pub mod math;
pub mod rng;
pub mod script;
pub mod serialize;
pub mod station;
pub mod units;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
