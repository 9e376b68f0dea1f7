pub mod component;
pub mod flow;
pub mod log;
pub mod metrics;
pub mod project;
