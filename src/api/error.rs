use crate::delivery::DeliveryError;
use rocket::http::{ContentType, Status};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    InvalidParameter(String),
    Delivery(DeliveryError),
}

impl From<DeliveryError> for ApiError {
    fn from(error: DeliveryError) -> Self {
        ApiError::Delivery(error)
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        match self {
            ApiError::InvalidParameter(message) => {
                let body = json!({
                    "error": "Invalid parameter",
                    "message": message
                })
                .to_string();

                rocket::Response::build()
                    .status(Status::BadRequest)
                    .header(ContentType::JSON)
                    .sized_body(None, std::io::Cursor::new(body))
                    .ok()
            }
            // Nothing usable to send; the body stays empty
            ApiError::Delivery(error) => {
                log::error!("Inline delivery aborted: {}", error);
                rocket::Response::build()
                    .status(Status::InternalServerError)
                    .ok()
            }
        }
    }
}
