#![doc = include_str!("../README.md")]

#[cfg(all(feature = "seq-21", feature = "seq-22"))]
compile_error!("Features 'seq-21' and 'seq-22' are mutually exclusive; select one id layout.");

#[cfg(not(any(feature = "seq-21", feature = "seq-22")))]
compile_error!("Select an id layout: enable exactly one of the 'seq-21' or 'seq-22' features.");

mod error;
mod generator;
pub mod global;
mod id;
mod time;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::time::*;

#[doc(hidden)]
pub mod __private {
    #[cfg(feature = "serde")]
    pub use serde;
}
