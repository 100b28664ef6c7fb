//! Adaptive authentication orchestrator.
//!
//! One state machine, four entry points:
//!
//! ```text
//! Start -> CredentialsChecked -> { Authenticated, StepUpRequired }
//! StepUpRequired -> (complete_step_up) -> Authenticated
//! ```
//!
//! Each flow verifies the password at most once and a TOTP code at most once.
//! The risk-scored flow never validates TOTP itself; that belongs entirely to
//! step-up completion, so users are only asked for a code when scoring flags
//! the attempt.
//!
//! Behavioral-model policy: the blob is replaced wholesale by whatever the
//! oracle returns. On a successful scoring call it is persisted even for a
//! normal verdict (the oracle may have initialized or normalized it). When
//! the oracle is unreachable the prior blob is left untouched and the attempt
//! fails closed into a step-up demand. A failed supervised update after
//! step-up is soft: logged, blob unchanged, login still succeeds.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::credentials::CredentialVerifier;
use crate::error::AuthError;
use crate::identity;
use crate::password::SecretHasher;
use crate::risk::{RiskLabel, RiskOracle, RiskVerdict};
use crate::session::{Session, SessionIssuer};
use crate::store::{CredentialRecord, StoreError, UserStore};
use crate::totp::TotpEngine;

/// Registration payload. The enrollment secret comes from
/// [`Orchestrator::generate_enrollment_secret`] and the code proves the caller
/// holds it.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub totp_secret: String,
    pub totp_code: String,
    pub display_name: Option<String>,
}

/// Terminal outcome of a risk-scored login attempt that was not rejected.
#[derive(Debug)]
pub enum LoginOutcome {
    Authenticated(Session),
    /// Credentials were valid but the attempt was flagged; no session is
    /// issued until the step-up challenge completes.
    StepUpRequired,
}

pub struct Orchestrator {
    store: Arc<dyn UserStore>,
    verifier: CredentialVerifier,
    hasher: Arc<dyn SecretHasher>,
    oracle: Arc<dyn RiskOracle>,
    totp: TotpEngine,
    sessions: SessionIssuer,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: Arc<dyn SecretHasher>,
        oracle: Arc<dyn RiskOracle>,
        totp: TotpEngine,
        sessions: SessionIssuer,
    ) -> Self {
        let verifier = CredentialVerifier::new(Arc::clone(&store), Arc::clone(&hasher));
        Self {
            store,
            verifier,
            hasher,
            oracle,
            totp,
            sessions,
        }
    }

    /// Produce a fresh enrollment secret for a prospective signup.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidSecretFormat`] when secret generation fails.
    pub fn generate_enrollment_secret(&self) -> Result<String, AuthError> {
        self.totp.generate_secret().map_err(|err| {
            error!("enrollment secret generation failed: {err}");
            AuthError::InvalidSecretFormat
        })
    }

    /// Enrollment flow: prove possession of the TOTP secret, then create the
    /// credential record. Nothing is written when the code does not match.
    ///
    /// # Errors
    /// Rejects with the taxonomy in [`AuthError`]; on rejection no record
    /// exists.
    pub async fn signup(&self, request: SignupRequest) -> Result<CredentialRecord, AuthError> {
        let email = identity::normalize(&request.email);
        if !identity::valid_email(&email) {
            return Err(AuthError::InvalidIdentity);
        }

        self.validate_code(&request.totp_secret, &request.totp_code)?;

        let password_hash = self.hash_password(&request.password)?;
        let record = CredentialRecord::new(
            email,
            password_hash,
            request.totp_secret,
            request.display_name,
        );

        match self.store.create(&record).await {
            Ok(()) => Ok(record),
            Err(StoreError::AlreadyExists) => Err(AuthError::IdentityExists),
            Err(err) => {
                error!("failed to create credential record: {err}");
                Err(AuthError::StorageUnavailable)
            }
        }
    }

    /// Direct flow: password and TOTP code together, no risk scoring.
    ///
    /// # Errors
    /// All mismatches are `InvalidCredentials`: a distinct code-mismatch
    /// error here would reveal that the password step had already succeeded.
    pub async fn authenticate_direct(
        &self,
        identity: &str,
        password: &str,
        totp_code: &str,
    ) -> Result<Session, AuthError> {
        let identity = crate::identity::normalize(identity);
        let record = self.verifier.verify(&identity, password).await?;
        self.validate_code(&record.totp_secret, totp_code)
            .map_err(|err| match err {
                AuthError::InvalidTotpCode => AuthError::InvalidCredentials,
                other => other,
            })?;
        self.issue_session(&record.identity)
    }

    /// Risk-scored flow: password only; the oracle decides whether a session
    /// is issued immediately or a step-up challenge is signalled.
    ///
    /// # Errors
    /// Oracle failures are not errors to the caller: they fold into
    /// [`LoginOutcome::StepUpRequired`] (fail-closed).
    pub async fn authenticate_with_risk_scoring(
        &self,
        identity: &str,
        password: &str,
        context: &Value,
    ) -> Result<LoginOutcome, AuthError> {
        let identity = crate::identity::normalize(identity);
        let mut record = self.verifier.verify(&identity, password).await?;

        let assessment = match self
            .oracle
            .score(&record.identity, context, &record.model_blob)
            .await
        {
            Ok(assessment) => assessment,
            Err(err) => {
                // Fail closed: an unreachable oracle demands step-up, never a
                // free pass. The prior blob stays untouched.
                warn!(identity = %record.identity, "risk oracle unavailable, demanding step-up: {err}");
                return Ok(LoginOutcome::StepUpRequired);
            }
        };

        debug!(
            identity = %record.identity,
            score = assessment.score,
            "risk verdict: {:?}",
            assessment.verdict
        );

        // Persist the post-attempt model even on a normal verdict; the oracle
        // may have initialized or normalized it.
        record.model_blob = assessment.model;
        self.persist(&record).await?;

        match assessment.verdict {
            RiskVerdict::Normal => Ok(LoginOutcome::Authenticated(
                self.issue_session(&record.identity)?,
            )),
            RiskVerdict::Anomaly => Ok(LoginOutcome::StepUpRequired),
        }
    }

    /// Step-up flow: TOTP code after an anomaly verdict. The password was
    /// already verified when step-up was signalled, so it is not re-checked.
    /// A valid code retroactively labels the attempt legitimate and feeds the
    /// supervised model update.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown identity, `InvalidTotpCode` on a
    /// code mismatch (no model update is attempted in that case).
    pub async fn complete_step_up(
        &self,
        identity: &str,
        totp_code: &str,
        context: &Value,
    ) -> Result<Session, AuthError> {
        let identity = crate::identity::normalize(identity);
        let mut record = match self.store.find_by_identity(&identity).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(AuthError::InvalidCredentials),
            Err(err) => {
                error!("credential lookup failed: {err}");
                return Err(AuthError::StorageUnavailable);
            }
        };

        self.validate_code(&record.totp_secret, totp_code)?;

        match self
            .oracle
            .request_model_update(&record.identity, context, &record.model_blob, RiskLabel::Normal)
            .await
        {
            Ok(model) => {
                record.model_blob = model;
                self.persist(&record).await?;
            }
            Err(err) => {
                // Soft failure: the user already proved possession of the
                // factor; keep the prior model and let the login succeed.
                warn!(identity = %record.identity, "model update failed, keeping prior model: {err}");
            }
        }

        self.issue_session(&record.identity)
    }

    fn validate_code(&self, secret: &str, code: &str) -> Result<(), AuthError> {
        match self.totp.validate(secret, code, unix_now()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::InvalidTotpCode),
            Err(err) => {
                error!("enrollment secret rejected: {err}");
                Err(AuthError::InvalidSecretFormat)
            }
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        self.hasher.hash(password).map_err(|err| {
            error!("password hashing failed: {err}");
            AuthError::HashingFailed
        })
    }

    async fn persist(&self, record: &CredentialRecord) -> Result<(), AuthError> {
        self.store.save(record).await.map_err(|err| {
            error!(identity = %record.identity, "failed to persist credential record: {err}");
            AuthError::StorageUnavailable
        })
    }

    fn issue_session(&self, identity: &str) -> Result<Session, AuthError> {
        self.sessions.issue(identity).map_err(|err| {
            error!("failed to issue session token: {err}");
            AuthError::SessionIssueFailed
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
