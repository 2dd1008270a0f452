mod errors;
mod paths;

pub use errors::Error;
pub use paths::ensure_parent_dir;

pub type ReelResult<T> = Result<T, Error>;
