pub mod request;

pub use request::{
    normalize_url, parse_callback, DeliveryTarget, RenderOptions, RenderRequest, RequestContext,
    RECOGNIZED_OPTIONS, SIZE_HINT_OPTION,
};
