mod clear_dir;

pub use clear_dir::*;
