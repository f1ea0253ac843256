pub mod thumbnail;
pub mod tools;

pub use thumbnail::{derived_path, ThumbnailCache};
pub use tools::{detect_image_type, JpegResizer, ResizeError, Resizer};
