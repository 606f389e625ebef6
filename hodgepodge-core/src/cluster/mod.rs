pub mod store;
pub mod types;

pub use store::{ClusterStore, StoreLayout, Versioned};
pub use types::{ClusterData, Master, Masters, RepGroup, RepGroups, StolonSpec};
