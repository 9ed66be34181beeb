use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::gate::VerifiedIdentity;
use super::service::Credentials;
use super::signup::NewAccount;
use super::validation::{check_email, check_name, check_password, FieldErrors};
use crate::db::LoginAttempt;
use crate::error::{AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignupRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_name(&mut errors, &self.name);
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), AppError> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &self.email);
        check_password(&mut errors, &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptResponse {
    pub created_at: DateTime<Utc>,
    pub success: bool,
}

impl From<LoginAttempt> for LoginAttemptResponse {
    fn from(attempt: LoginAttempt) -> Self {
        Self {
            created_at: attempt.created_at,
            success: attempt.success,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginAttemptsQuery {
    pub email: Option<String>,
}

pub async fn signup(
    req: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    req.validate()?;
    info!("Received signup request for email: {}", req.email);

    state
        .signup
        .signup(NewAccount {
            name: req.name,
            email: req.email,
            password: req.password,
        })
        .await?;

    Ok(HttpResponse::Created().finish())
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    req.validate()?;
    info!("Received login request for email: {}", req.email);

    let credentials = Credentials {
        subject: req.email,
        secret: req.password,
    };
    let issued = state.login.login(credentials, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(LoginResponse {
        email: issued.subject,
        token: issued.token,
    }))
}

pub async fn login_attempts(
    identity: Option<VerifiedIdentity>,
    query: web::Query<LoginAttemptsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let subject = match (query.into_inner().email, identity.as_ref()) {
        (Some(email), _) => email,
        (None, Some(identity)) => identity.subject().to_string(),
        (None, None) => {
            warn!("Login attempts requested without a bound identity");
            return Err(AuthError::Unauthorized.into());
        }
    };

    let attempts = state.login.list_recent(identity.as_ref(), &subject).await?;
    let body: Vec<LoginAttemptResponse> = attempts.into_iter().map(Into::into).collect();

    Ok(HttpResponse::Ok().json(body))
}
