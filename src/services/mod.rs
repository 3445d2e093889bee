//! Image I/O and output encoding services

pub mod format;
pub mod io;

pub use format::{OutputFormatHandler, DEFAULT_JPEG_QUALITY};
pub use io::{ImageIOService, OUTPUT_FILE_PREFIX};
