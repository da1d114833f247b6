//! End-to-end pipeline scenarios

#[path = "../helpers.rs"]
mod helpers;

mod cancellation;
mod control_flow;
mod messaging;
mod ordering;
mod skip_conditions;
mod tracing;
