use actix_web::{Responder, get};
use common::{error::Res, http::Success};

use crate::dtos::sub::DataResponse;

/// Metered resource.
///
/// Mounted under `/data/user/{user_id}` behind the metering middleware, which
/// has already admitted the request and consumed one unit of quota by the
/// time this handler runs.
///
/// # Output
/// - 200 `{ "data": "..." }`
/// - 404 unknown user, 429 rate limit or monthly quota, 503 store unavailable
///   (all produced by the middleware)
#[get("")]
pub async fn get_data() -> Res<impl Responder> {
    Success::ok(DataResponse {
        data: "Some API response data",
    })
}
