//! HTTP handlers owned by the library itself.

pub mod bridge;
pub mod call;
pub use bridge::*;
pub use call::*;
