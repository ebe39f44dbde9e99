mod contract;
mod filter;
mod log;
mod source;

pub use contract::*;
pub use filter::*;
pub use log::*;
pub use source::*;
