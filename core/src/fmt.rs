//! Logging macros which forward to `defmt` on the device and `log` on the host.
//!
//! Only `{}` and `{:?}` placeholders are used so that the format strings are valid for both
//! backends.
#![allow(unused_macros)]

macro_rules! debug {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "no-std")]
            ::defmt::debug!($s $(, $x)*);
            #[cfg(all(feature = "std", not(feature = "no-std")))]
            ::log::debug!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "no-std")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! info {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "no-std")]
            ::defmt::info!($s $(, $x)*);
            #[cfg(all(feature = "std", not(feature = "no-std")))]
            ::log::info!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "no-std")))]
            let _ = ($( & $x ),*);
        }
    };
}

macro_rules! warn {
    ($s:literal $(, $x:expr)* $(,)?) => {
        {
            #[cfg(feature = "no-std")]
            ::defmt::warn!($s $(, $x)*);
            #[cfg(all(feature = "std", not(feature = "no-std")))]
            ::log::warn!($s $(, $x)*);
            #[cfg(not(any(feature = "std", feature = "no-std")))]
            let _ = ($( & $x ),*);
        }
    };
}
