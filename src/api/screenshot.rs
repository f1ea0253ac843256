use std::collections::HashMap;
use std::sync::Arc;

use rocket::http::uri::Origin;
use rocket::http::{ContentType, Header, RawStr, Status};
use rocket::response::{self, Redirect, Responder, Response};
use rocket::{Request, State};

use crate::api::ApiError;
use crate::delivery::ImagePayload;
use crate::models::{parse_callback, DeliveryTarget, RenderOptions, RenderRequest, RequestContext};
use crate::pipeline::ScreenshotService;

pub const USAGE_PAGE: &str = "/usage.html";

#[derive(Responder)]
pub enum ScreenshotResponse {
    Usage(Redirect),
    Accepted(String),
    Image(ImageResponse),
}

#[get("/?<params..>")]
pub async fn screenshot(
    params: HashMap<String, String>,
    service: &State<Arc<ScreenshotService>>,
) -> Result<ScreenshotResponse, ApiError> {
    let Some(target) = non_empty(&params, "url") else {
        return Ok(ScreenshotResponse::Usage(Redirect::found(USAGE_PAGE)));
    };

    let delivery = match non_empty(&params, "callback") {
        Some(raw) => {
            let callback = parse_callback(raw).map_err(|e| {
                ApiError::InvalidParameter(format!("Invalid callback URL '{}': {}", raw, e))
            })?;
            DeliveryTarget::Callback(callback)
        }
        None => DeliveryTarget::Inline,
    };

    let request = RenderRequest::new(target, RenderOptions::from_pairs(params.iter()));
    let context = RequestContext::new(request, delivery);
    log::debug!("Request for {} resolved to {}", context.request.url, context.fingerprint);

    match context.target.clone() {
        DeliveryTarget::Callback(callback) => {
            let message = format!("Will post screenshot to {} when processed", callback);
            service.spawn_callback(context, callback);
            Ok(ScreenshotResponse::Accepted(message))
        }
        DeliveryTarget::Inline => {
            let payload = service.serve_inline(&context).await?;
            Ok(ScreenshotResponse::Image(payload.into()))
        }
    }
}

/// Old-style `/www.example.com` requests: the whole remainder is the target.
#[get("/<_..>", rank = 20)]
pub fn legacy_redirect(origin: &Origin<'_>) -> Redirect {
    let raw = origin.to_string();
    let remainder = RawStr::new(raw.trim_start_matches('/')).percent_decode_lossy();
    let encoded: String = url::form_urlencoded::byte_serialize(remainder.as_bytes()).collect();
    Redirect::found(format!("/?url={}", encoded))
}

fn non_empty<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

/// Streams an opened result file, answering `304` when the client already
/// holds the same file.
pub struct ImageResponse {
    pub payload: ImagePayload,
}

impl From<ImagePayload> for ImageResponse {
    fn from(payload: ImagePayload) -> Self {
        Self { payload }
    }
}

impl<'r> Responder<'r, 'static> for ImageResponse {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let ImagePayload {
            file,
            len,
            content_type,
            etag,
        } = self.payload;
        let content_type = match content_type {
            "image/png" => ContentType::PNG,
            "image/gif" => ContentType::GIF,
            "image/webp" => ContentType::new("image", "webp"),
            _ => ContentType::JPEG,
        };
        if let Some(if_none_match) = req.headers().get_one("If-None-Match") {
            if if_none_match == etag {
                return Response::build()
                    .status(Status::NotModified)
                    .header(content_type)
                    .header(Header::new("ETag", etag))
                    .ok();
            }
        }
        Response::build()
            .header(content_type)
            .header(Header::new("ETag", etag))
            .sized_body(len as usize, file)
            .ok()
    }
}
