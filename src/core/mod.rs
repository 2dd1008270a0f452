pub mod extract;
pub mod frame;
pub mod load;
pub mod quality;
pub mod tmdb;
pub mod transform;
