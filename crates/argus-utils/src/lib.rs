//! Small iterator and numeric helpers shared by the `argus` crates.

pub mod iter;
pub mod num;
