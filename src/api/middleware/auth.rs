use crate::api::error::ApiError;
use crate::config::AppConfig;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};
use tracing::warn;

/// Checks `Authorization: Bearer <key>` (or `?api_key=`) against
/// `auth.api_keys`. An empty key list turns the check off.
pub struct ApiKeyAuth;

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = ApiKeyAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct ApiKeyAuthMiddleware<S> {
    service: Rc<S>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    if let Some(header_value) = req.headers().get("Authorization") {
        return header_value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string());
    }

    qstring::QString::from(req.query_string())
        .get("api_key")
        .map(str::to_string)
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        if req.method() == actix_web::http::Method::OPTIONS || req.path() == "/health" {
            return Box::pin(async move { srv.call(req).await });
        }

        let config = match req.app_data::<actix_web::web::Data<AppConfig>>() {
            Some(c) => c,
            None => {
                warn!("AppConfig missing in app_data");
                return Box::pin(async move {
                    Err(Error::from(ApiError::Internal("Configuration error".to_string())))
                });
            }
        };

        let keys = &config.auth.api_keys;
        let valid = keys.is_empty()
            || bearer_token(&req)
                .map(|token| keys.iter().any(|key| *key == token))
                .unwrap_or(false);

        if !valid {
            warn!(path = req.path(), "Rejected request with invalid or missing API key");
            return Box::pin(async move {
                Err(Error::from(ApiError::Unauthorized("Invalid or missing API key".to_string())))
            });
        }

        Box::pin(async move { srv.call(req).await })
    }
}
