mod merge;

pub use merge::{group_by_key, merge_by_key};
