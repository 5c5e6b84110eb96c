mod builder;
mod encoder;
mod status;
#[cfg(test)]
mod tests;

pub use builder::*;
pub use encoder::*;
pub use status::*;
