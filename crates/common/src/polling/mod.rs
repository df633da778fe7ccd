mod cancellation;
mod poll;

pub use cancellation::*;
pub use poll::*;
