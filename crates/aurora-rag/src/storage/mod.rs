//! Object storage access for document bundles

mod object;

pub use object::{local_path_for, ObjectSource, ObjectStoreSource};
