#![doc = include_str!("../README.md")]

mod config;
mod error;
mod event;
mod hook;
mod pool;
mod request;
mod task;
mod work;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::hook::*;
pub use crate::pool::*;
pub use crate::request::*;
pub use crate::task::Job;
pub use crate::work::*;
