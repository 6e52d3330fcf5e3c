//! Domain types and pure logic for batch stack rollouts.
//!
//! - [`update`]: update requests and identity keys.
//! - [`item`]: the per-item update state machine.
//! - [`health`]: service health classification.
//! - [`aggregate`]: batch completion and outcome.
//! - [`batch`]: the batch run aggregate tying them together.

pub mod aggregate;
pub mod batch;
pub mod batch_events;
pub mod error;
pub mod health;
pub mod item;
pub mod run_state;
pub mod types;
pub mod update;
