pub mod config_io;
pub mod scanner;
pub mod source_file;
pub mod watcher;
