#![doc = include_str!("../README.md")]

mod allocator;
mod coordinator;
mod error;
mod memory;

pub use crate::allocator::*;
pub use crate::coordinator::*;
pub use crate::error::*;
pub use crate::memory::*;
