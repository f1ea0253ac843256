pub mod cleaner;
pub mod fingerprint;
pub mod flight;
pub mod result;

pub use cleaner::FileCleaner;
pub use fingerprint::Fingerprint;
pub use flight::SingleFlight;
pub use result::{is_ready, ResultCache};
