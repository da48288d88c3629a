//! Data models

mod autoscale;
mod host;
mod startup;
mod vm;

pub use autoscale::*;
pub use host::*;
pub use startup::*;
pub use vm::*;
