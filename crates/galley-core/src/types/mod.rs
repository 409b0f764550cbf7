mod identity;
mod node;
mod report;
mod role;

pub use identity::*;
pub use node::*;
pub use report::*;
pub use role::*;
