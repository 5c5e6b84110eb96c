/// Internal helper to emit `serde` impls from `define_xid!` only when this
/// crate's `serde` feature is enabled.
#[doc(hidden)]
#[cfg(feature = "serde")]
#[macro_export]
macro_rules! cfg_serde {
    ($($item:item)*) => { $($item)* };
}

#[doc(hidden)]
#[cfg(not(feature = "serde"))]
#[macro_export]
macro_rules! cfg_serde {
    ($($item:item)*) => {};
}
