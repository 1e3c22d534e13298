pub mod change_log;
pub mod diff;
pub mod editor;
pub mod fs;
pub mod generator;
pub mod revert;
pub mod summary;
