pub mod store;

pub use store::{GraphStats, GraphStore, VertexId};
