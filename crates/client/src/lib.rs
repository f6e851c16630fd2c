//! Polling client for the netjobs HTTP API.

pub mod client;
pub mod edges;
pub mod error;

pub use client::{JobClient, JobStatus};
pub use edges::parse_edge_list;
pub use error::ClientError;
