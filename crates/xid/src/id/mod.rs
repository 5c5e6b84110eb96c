mod extract;
mod interface;
mod layout;
mod utils;

pub use extract::*;
pub use interface::*;
pub use layout::*;
