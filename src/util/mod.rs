mod log;
pub mod path;

pub use log::init_logging;
pub use path::{contains_file, normalize};
