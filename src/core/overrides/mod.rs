pub mod lists;
pub mod payload;
pub mod sheet;

pub use lists::*;
pub use payload::*;
pub use sheet::*;
