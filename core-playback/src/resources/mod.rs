//! Resource lifetime management: named disposables and the element pool.

mod manager;
mod pool;

pub use manager::{ResourceKind, ResourceManager, ResourceStats};
pub use pool::ElementPool;
