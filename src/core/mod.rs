pub mod bucket;
pub mod catalog;
pub mod filter;
pub mod github;
pub mod heal;
pub mod identity;
pub mod letterboxd;
pub mod overrides;
pub mod pool;
pub mod report;
pub mod tmdb;
