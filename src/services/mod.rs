pub mod mood;
pub mod tmdb;
