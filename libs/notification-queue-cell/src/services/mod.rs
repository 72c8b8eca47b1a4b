pub mod gateway;
pub mod memory;
pub mod queue;

pub use gateway::*;
pub use memory::*;
pub use queue::*;
