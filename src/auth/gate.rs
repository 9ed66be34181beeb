//! Request-level authentication gate.
//!
//! `AuthGate` runs once per request ahead of every handler. It looks for a
//! bearer token, verifies it, confirms the subject still has an account and
//! binds a [`VerifiedIdentity`] to the request extensions. Requests to
//! protected routes that carry no usable credential are answered by the gate
//! itself and never reach their handler.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::{HeaderMap, AUTHORIZATION}, Method},
    FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use chrono::{DateTime, Utc};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::token::{TokenCodec, TokenError};
use crate::db::UserStore;
use crate::error::{AppError, AuthError, DatabaseError};

pub const BEARER_PREFIX: &str = "Bearer ";

/// Subject of a verified token, bound to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    subject: String,
}

impl VerifiedIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into() }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl FromRequest for VerifiedIdentity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<VerifiedIdentity>()
                .cloned()
                .ok_or(AppError::AuthError(AuthError::Unauthorized)),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
}

#[derive(Debug, Clone)]
struct RouteRule {
    method: Method,
    path: String,
    access: Access,
}

impl RouteRule {
    // `/api/auth/signup` also covers `/api/auth/signup/...`.
    fn matches(&self, method: &Method, path: &str) -> bool {
        if self.method != *method {
            return false;
        }
        match path.strip_prefix(self.path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Explicit method+path table consulted before handler dispatch.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    fallback: Access,
}

impl RouteTable {
    pub fn new(fallback: Access) -> Self {
        Self {
            rules: Vec::new(),
            fallback,
        }
    }

    pub fn public(self, method: Method, path: &str) -> Self {
        self.with_rule(method, path, Access::Public)
    }

    pub fn protected(self, method: Method, path: &str) -> Self {
        self.with_rule(method, path, Access::Protected)
    }

    fn with_rule(mut self, method: Method, path: &str, access: Access) -> Self {
        self.rules.push(RouteRule {
            method,
            path: path.trim_end_matches('/').to_string(),
            access,
        });
        self
    }

    /// First matching rule wins; unmatched requests get the fallback.
    pub fn access(&self, method: &Method, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| rule.matches(method, path))
            .map(|rule| rule.access)
            .unwrap_or(self.fallback)
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        RouteTable::new(Access::Protected)
            .public(Method::POST, "/api/auth/signup")
            .public(Method::POST, "/api/auth/login")
            .public(Method::GET, "/health")
    }
}

#[derive(Error, Debug)]
pub enum GateError {
    #[error("{0}")]
    Token(#[from] TokenError),

    #[error("identity no longer exists")]
    IdentityNotFound(String),

    #[error("identity lookup failed: {0}")]
    Lookup(#[from] DatabaseError),
}

impl From<GateError> for AppError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Lookup(e) => AppError::DatabaseError(e),
            other => AppError::AuthError(AuthError::AccessDenied(other.to_string())),
        }
    }
}

/// Candidate token from `Authorization: Bearer <token>`. A missing header or
/// another scheme means no credential was offered.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
}

#[derive(Clone)]
pub struct AuthGate {
    tokens: Arc<TokenCodec>,
    users: Arc<dyn UserStore>,
    routes: Arc<RouteTable>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenCodec>, users: Arc<dyn UserStore>, routes: Arc<RouteTable>) -> Self {
        Self { tokens, users, routes }
    }

    /// Verifies a candidate token and resolves its subject to a live account.
    pub async fn authenticate(
        &self,
        candidate: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<VerifiedIdentity>, GateError> {
        let Some(token) = candidate else {
            return Ok(None);
        };

        let subject = self.tokens.verify(token, now)?;
        match self.users.find_by_email(&subject).await? {
            Some(_) => Ok(Some(VerifiedIdentity::new(subject))),
            None => Err(GateError::IdentityNotFound(subject)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Transform = AuthGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthGateMiddleware {
            service: Rc::new(service),
            gate: self.clone(),
        }))
    }
}

pub struct AuthGateMiddleware<S> {
    service: Rc<S>,
    gate: AuthGate,
}

impl<S, B> Service<ServiceRequest> for AuthGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = self.gate.clone();

        Box::pin(async move {
            let access = gate.routes.access(req.method(), req.path());

            // Never overwrite an identity bound earlier in the chain.
            if req.extensions().contains::<VerifiedIdentity>() {
                return service.call(req).await.map(ServiceResponse::map_into_left_body);
            }

            let candidate = bearer_token(req.headers()).map(str::to_owned);
            let denial = match gate.authenticate(candidate.as_deref(), Utc::now()).await {
                Ok(Some(identity)) => {
                    debug!("Bound identity {} for {} {}", identity.subject(), req.method(), req.path());
                    req.extensions_mut().insert(identity);
                    None
                }
                Ok(None) if access == Access::Protected => Some(AppError::AuthError(
                    AuthError::AccessDenied("authentication required".to_string()),
                )),
                Ok(None) => None,
                Err(err) => {
                    warn!("Rejected bearer token on {} {}: {:?}", req.method(), req.path(), err);
                    match (access, err) {
                        (_, GateError::Lookup(e)) => Some(AppError::DatabaseError(e)),
                        (Access::Protected, err) => Some(AppError::from(err)),
                        (Access::Public, _) => None,
                    }
                }
            };

            match denial {
                Some(err) => {
                    let response = err.error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
                None => service.call(req).await.map(ServiceResponse::map_into_left_body),
            }
        })
    }
}
