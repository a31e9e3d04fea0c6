mod files;
mod headers;
mod reader;

pub use files::*;
pub use headers::*;
pub use reader::*;

pub use ::chrono;
