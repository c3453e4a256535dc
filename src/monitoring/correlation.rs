//! Per-request correlation IDs, propagated through structured logs.

use actix_web::{
    body::MessageBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use uuid::Uuid;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationId;

/// Actix middleware that stamps every request/response pair with a
/// correlation ID, reusing an inbound one if the caller already supplied it.
impl<S, B> Transform<S, ServiceRequest> for CorrelationId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = CorrelationIdMiddleware<S>;
    type InitError = ();
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CorrelationIdMiddleware { service }))
    }
}

pub struct CorrelationIdMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for CorrelationIdMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header_name = HeaderName::from_static(CORRELATION_HEADER);
        let incoming = req
            .headers()
            .get(&header_name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let correlation_id = incoming.unwrap_or_else(|| Uuid::new_v4().to_string());

        let span = tracing::info_span!("request", correlation_id = %correlation_id);
        let _entered = span.enter();

        let fut = self.service.call(req);
        let value = HeaderValue::from_str(&correlation_id).ok();
        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(value) = value {
                res.headers_mut().insert(header_name, value);
            }
            Ok(res)
        })
    }
}
