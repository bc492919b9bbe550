pub mod check;
pub mod common;
pub mod mirror;
pub mod scrape;
