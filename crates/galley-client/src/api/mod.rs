//! API endpoint modules.

mod node;

pub use node::NodeApi;
