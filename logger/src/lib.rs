#![no_std]

//! Logging front-end shared by the firmware crates.
//!
//! The macros expand in the calling crate, so the `defmt`/`log` cfg checks
//! refer to the caller's features. A crate using these macros forwards its
//! `defmt` and `log` features here and depends on the backends itself.
//! With neither feature enabled every macro compiles to nothing, but the
//! arguments are still type checked.

#[doc(hidden)]
#[macro_export]
macro_rules! __dispatch {
    ($level:ident, $($args:tt)*) => {{
        #[cfg(feature = "defmt")]
        defmt::$level!($($args)*);
        #[cfg(feature = "log")]
        log::$level!($($args)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        {
            let _ = || {
                let _ = core::format_args!($($args)*);
            };
        }
    }};
}

#[macro_export]
macro_rules! trace {
    ($($args:tt)*) => { $crate::__dispatch!(trace, $($args)*) };
}

#[macro_export]
macro_rules! debug {
    ($($args:tt)*) => { $crate::__dispatch!(debug, $($args)*) };
}

#[macro_export]
macro_rules! info {
    ($($args:tt)*) => { $crate::__dispatch!(info, $($args)*) };
}

#[macro_export]
macro_rules! warn {
    ($($args:tt)*) => { $crate::__dispatch!(warn, $($args)*) };
}

#[macro_export]
macro_rules! error {
    ($($args:tt)*) => { $crate::__dispatch!(error, $($args)*) };
}
