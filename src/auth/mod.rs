//! Authentication: token issuance and verification, the request gate,
//! credential checks and the login attempt ledger.

pub mod credentials;
pub mod gate;
pub mod handlers;
pub mod ledger;
pub mod service;
pub mod signup;
pub mod token;
pub mod validation;

pub use credentials::{CredentialError, CredentialVerifier, SecretHasher};
pub use gate::{Access, AuthGate, RouteTable, VerifiedIdentity};
pub use ledger::AttemptLedger;
pub use service::{Credentials, IssuedToken, LoginOrchestrator};
pub use signup::{NewAccount, SignupService};
pub use token::{Claims, SigningKey, TokenCodec, TokenError};
