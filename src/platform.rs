//! Time sources and asset file loading that work the same whether running
//! natively or in a browser.
mod fileio;
mod time;

pub use fileio::*;
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
