pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Identity, Publish, Read, Rotate, Version};
