pub mod category;
pub mod paper;

pub use category::*;
pub use paper::*;
