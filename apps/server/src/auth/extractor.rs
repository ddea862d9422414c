//! Actix-web extractor for the operator identity header.

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use std::future::{Ready, ready};
use tracing::warn;

use crate::config::OPERATOR_HEADER;
use crate::error::AppError;
use crate::models::Operator;

/// Longest operator id accepted from the header.
const MAX_OPERATOR_ID_LEN: usize = 255;

/// Extractor that requires an operator on the request.
///
/// ```ignore
/// async fn handler(auth: OperatorAuth) -> impl Responder {
///     // auth.operator.id identifies who acted
/// }
/// ```
pub struct OperatorAuth {
    pub operator: Operator,
}

fn operator_from_request(req: &HttpRequest) -> Result<Operator, AppError> {
    let value = req
        .headers()
        .get(OPERATOR_HEADER)
        .ok_or_else(|| {
            AppError::Unauthorized(format!("Missing operator. Provide {} header.", OPERATOR_HEADER))
        })?
        .to_str()
        .map_err(|_| AppError::Unauthorized(format!("{} is not valid text", OPERATOR_HEADER)))?
        .trim();

    if value.is_empty() || value.len() > MAX_OPERATOR_ID_LEN {
        return Err(AppError::Unauthorized(format!(
            "{} must be 1-{} characters",
            OPERATOR_HEADER, MAX_OPERATOR_ID_LEN
        )));
    }

    Ok(Operator::new(value))
}

impl FromRequest for OperatorAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            operator_from_request(req)
                .map(|operator| OperatorAuth { operator })
                .inspect_err(|e| warn!(path = %req.path(), "Rejected request: {}", e)),
        )
    }
}
