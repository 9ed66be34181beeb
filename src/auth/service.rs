use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::credentials::{CredentialError, CredentialVerifier};
use super::gate::VerifiedIdentity;
use super::ledger::AttemptLedger;
use super::token::TokenCodec;
use crate::db::LoginAttempt;
use crate::error::{AppError, AuthError};

/// Transient login input, dropped once verification is done.
pub struct Credentials {
    pub subject: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub subject: String,
    pub token: String,
}

/// Login use case: verify credentials, issue a token, and record the attempt.
///
/// Every call writes exactly one `LoginAttempt` before it returns, including
/// calls whose account lookup failed. If that write fails the call fails too;
/// no token leaves without its audit record.
pub struct LoginOrchestrator {
    verifier: CredentialVerifier,
    tokens: Arc<TokenCodec>,
    ledger: AttemptLedger,
}

impl LoginOrchestrator {
    pub fn new(verifier: CredentialVerifier, tokens: Arc<TokenCodec>, ledger: AttemptLedger) -> Self {
        Self {
            verifier,
            tokens,
            ledger,
        }
    }

    pub async fn login(&self, credentials: Credentials, now: DateTime<Utc>) -> Result<IssuedToken, AppError> {
        let Credentials { subject, secret } = credentials;

        match self.verifier.verify(&subject, &secret).await {
            Ok(()) => {}
            Err(CredentialError::Store(err)) => {
                // The lookup error is what the caller sees, even if recording fails too.
                if let Err(record_err) = self.ledger.record(&subject, false, now).await {
                    error!("Failed to record login attempt for {}: {}", subject, record_err);
                }
                return Err(err.into());
            }
            Err(err) => {
                self.ledger.record(&subject, false, now).await?;
                warn!("Login rejected for {}", subject);
                return Err(err.into());
            }
        }

        let token = self.tokens.issue(&subject, now)?;
        self.ledger.record(&subject, true, now).await?;
        info!("Login succeeded for {}", subject);

        Ok(IssuedToken { subject, token })
    }

    /// Recent attempts for `subject`, most recent first. Callers may only read
    /// their own history, and a missing identity is refused outright.
    pub async fn list_recent(
        &self,
        caller: Option<&VerifiedIdentity>,
        subject: &str,
    ) -> Result<Vec<LoginAttempt>, AppError> {
        match caller {
            Some(identity) if identity.subject() == subject => {}
            Some(identity) => {
                warn!("{} asked for login attempts of {}", identity.subject(), subject);
                return Err(AuthError::Unauthorized.into());
            }
            None => return Err(AuthError::Unauthorized.into()),
        }

        Ok(self.ledger.recent(subject).await?)
    }
}
