mod errors;
pub mod text;

pub use errors::Error;

pub type BoxdResult<T> = Result<T, Error>;
