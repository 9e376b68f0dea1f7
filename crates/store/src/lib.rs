pub mod db;
pub mod graph;
pub mod metrics;
pub mod query;
pub mod schema;
pub mod write;

pub use db::Store;
