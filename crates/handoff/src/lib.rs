#![doc = include_str!("../README.md")]

mod error;
mod pool;
mod worker;

pub use crate::error::*;
pub use crate::pool::*;
pub use crate::worker::*;
