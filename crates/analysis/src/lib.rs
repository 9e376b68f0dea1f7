pub mod aggregate;
pub mod batch;
pub mod flow;
pub mod graph;
pub mod resolver;
pub mod scheduler;
pub mod timeline;

pub use aggregate::Aggregator;
pub use batch::DependencyLoader;
pub use flow::TraceFlowService;
