//! Model building blocks for training and inference.

pub mod gbdt;
pub mod metrics;
