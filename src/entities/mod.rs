pub mod lead;
pub mod listing;

pub use lead::*;
pub use listing::*;
