use std::rc::Rc;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::error::Error;
use actix_web::http::header;
use actix_web::{HttpMessage, ResponseError};
use futures::future::{ok, LocalBoxFuture, Ready};

use crate::errors::ApiError;
use crate::models::User;

/// Resolves a raw bearer token to an account. The store implements this; tests
/// substitute an in-memory table.
#[allow(async_fn_in_trait)]
pub trait TokenLookup: Clone + 'static {
    async fn find_by_token(&self, token: &str) -> Result<Option<User>, ApiError>;
}

/// The identity attached to a request once its token resolved.
#[derive(Debug, Clone)]
pub struct Identity(pub User);

/// The only access-control gate in the system: authenticated is binary, there
/// are no roles. The `Authorization` header carries the raw token with no
/// scheme prefix.
pub struct RequireAuth<L> {
    lookup: L,
}

impl<L> RequireAuth<L> {
    pub fn new(lookup: L) -> Self {
        RequireAuth { lookup }
    }
}

impl<S, B, L> Transform<S, ServiceRequest> for RequireAuth<L>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    L: TokenLookup,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequireAuthService<S, L>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequireAuthService {
            service: Rc::new(service),
            lookup: self.lookup.clone(),
        })
    }
}

pub struct RequireAuthService<S, L> {
    service: Rc<S>,
    lookup: L,
}

impl<S, B, L> Service<ServiceRequest> for RequireAuthService<S, L>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
    L: TokenLookup,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let lookup = self.lookup.clone();
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let token = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);

            let resolved = match token {
                Some(token) => lookup.find_by_token(&token).await,
                None => Ok(None),
            };

            match resolved {
                Ok(Some(user)) => {
                    req.extensions_mut().insert(Identity(user));
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Ok(None) => {
                    let response = ApiError::Auth.error_response().map_into_right_body();
                    Ok(req.into_response(response))
                }
                Err(e) => {
                    let response = e.error_response().map_into_right_body();
                    Ok(req.into_response(response))
                }
            }
        })
    }
}
