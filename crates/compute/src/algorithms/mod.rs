pub mod communities;
pub mod fastgreedy;
pub mod infomap;
pub mod layout;
pub mod leading_eigenvector;
pub mod leiden;
pub mod multilevel;
pub mod network;
pub mod partition;

pub use network::Network;
pub use partition::Quality;
