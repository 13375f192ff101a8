//! Control-flow analyses: dominator tree and dominance frontiers.
//!
//! Both results are computed over the blocks reachable from a function's
//! entry and are invalidated by any CFG mutation. The SSA constructor
//! consumes them read-only.

pub mod dominators;
pub mod frontiers;

pub use dominators::Dominators;
pub use frontiers::DominanceFrontiers;
