mod gateway;
mod pipeline;

pub use pipeline::{Pipeline, RunReport};
