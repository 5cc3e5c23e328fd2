//! Shared filesystem helpers.

pub mod files;
pub mod temp;

pub use files::write_file_with_dirs;
pub use temp::prepare_work_dir;
