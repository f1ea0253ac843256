pub mod error;
pub mod screenshot;

pub use error::ApiError;
pub use screenshot::{ImageResponse, ScreenshotResponse, USAGE_PAGE};
