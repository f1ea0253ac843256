use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};

/// Adds cross-origin headers to image responses when enabled.
pub struct CORS {
    enabled: bool,
}

impl CORS {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Cross-origin image headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r Request<'_>, res: &mut Response<'r>) {
        if !self.enabled {
            return;
        }
        let is_image = res.content_type().map_or(false, |ct| ct.top() == "image");
        if is_image {
            res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
            res.set_header(Header::new("Access-Control-Expose-Headers", "Content-Type"));
        }
    }
}
