use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue, WWW_AUTHENTICATE};
use hyper::{Response, StatusCode};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Every response of the server is labelled `application/json`, whatever
/// the body.
pub struct ResponseBuilder;

impl ResponseBuilder {
    pub fn empty(status: StatusCode) -> Response<Full<Bytes>> {
        Self::json(status, Bytes::new())
    }

    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(body.into()));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        response
    }

    /// 401 with the `WWW-Authenticate: Test` challenge.
    pub fn unauthorized() -> Response<Full<Bytes>> {
        let mut response = Self::empty(StatusCode::UNAUTHORIZED);
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Test"));
        response
    }

    pub fn from_code(code: u16) -> Response<Full<Bytes>> {
        Self::empty(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_always_json() {
        for response in [
            ResponseBuilder::empty(StatusCode::OK),
            ResponseBuilder::json(StatusCode::OK, "{}"),
            ResponseBuilder::unauthorized(),
            ResponseBuilder::from_code(418),
        ] {
            assert_eq!(response.headers()[CONTENT_TYPE], CONTENT_TYPE_JSON);
        }
    }

    #[test]
    fn test_unauthorized_challenge() {
        let response = ResponseBuilder::unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Test");
    }

    #[test]
    fn test_from_code() {
        assert_eq!(ResponseBuilder::from_code(503).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ResponseBuilder::from_code(1).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
