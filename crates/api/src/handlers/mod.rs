pub mod batch;
pub mod hosts;
pub mod metrics;
