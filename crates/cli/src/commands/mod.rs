pub mod backends;
pub mod search;
pub mod util;

pub use backends::*;
pub use search::*;
pub use util::*;
