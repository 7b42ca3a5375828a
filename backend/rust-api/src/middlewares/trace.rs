use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Stamps every request/response pair with a trace identifier so logs and
/// metrics can be correlated with a specific participant action.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = incoming_trace_id(request.headers())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });
    stamp(request.headers_mut(), &trace_id);

    let mut response = next.run(request).await;
    stamp(response.headers_mut(), &trace_id);
    response
}

fn incoming_trace_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

fn stamp(headers: &mut HeaderMap, trace_id: &str) {
    if headers.get(TRACE_ID_HEADER).is_none() {
        if let Ok(value) = HeaderValue::from_str(trace_id) {
            headers.insert(HeaderName::from_static(TRACE_ID_HEADER), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_does_not_overwrite_an_existing_id() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(TRACE_ID_HEADER),
            HeaderValue::from_static("upstream-id"),
        );
        stamp(&mut headers, "new-id");
        assert_eq!(headers.get(TRACE_ID_HEADER).unwrap(), "upstream-id");
    }

    #[test]
    fn stamp_fills_in_a_missing_id() {
        let mut headers = HeaderMap::new();
        stamp(&mut headers, "generated-id");
        assert_eq!(headers.get(TRACE_ID_HEADER).unwrap(), "generated-id");
    }
}
