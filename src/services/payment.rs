//! Payment capture.
//!
//! Two gateways sit behind [`PaymentGateway`]:
//! 1. **LocalCapture** records the payment as completed without talking to
//!    anyone. It is the default for development and for card/PayPal forms.
//! 2. **StripeGateway** creates and confirms a PaymentIntent. Network failures
//!    and 5xx responses feed a circuit breaker (`failsafe`), so a dead Stripe
//!    fails checkouts fast instead of tying up database transactions.
//!
//! A capture whose booking then fails to commit is handed back through
//! [`PaymentGateway::refund`].

use failsafe::{backoff, failure_policy, futures::CircuitBreaker, StateMachine};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    config::{CircuitBreakerConfig, PaymentConfig, PaymentProvider},
    error::{AppError, AppResult},
    forms::PaymentMethod,
    store::CaptureReceipt,
};

/// What the orchestrator asks a gateway to charge.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub ticket_id: i64,
    /// Amount in minor currency units (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub receipt_email: String,
    pub method: PaymentMethod,
    pub stripe_payment_method: Option<String>,
    /// Stable for retries of the same checkout attempt.
    pub idempotency_key: String,
}

pub trait PaymentGateway: Send + Sync {
    fn capture(&self, request: CaptureRequest) -> impl Future<Output = AppResult<CaptureReceipt>> + Send;

    /// Reverses a capture whose booking was rolled back.
    fn refund(
        &self,
        receipt: &CaptureReceipt,
        request: &CaptureRequest,
    ) -> impl Future<Output = AppResult<()>> + Send;

    /// Whether checkout must carry a client-side payment method token.
    fn requires_payment_token(&self) -> bool {
        false
    }
}

/* ---------- local ---------- */

#[derive(Debug, Clone, Default)]
pub struct LocalCapture;

impl PaymentGateway for LocalCapture {
    async fn capture(&self, request: CaptureRequest) -> AppResult<CaptureReceipt> {
        info!(
            "local capture: ticket={}, amount={} {}, method={}",
            request.ticket_id,
            request.amount_minor,
            request.currency,
            request.method.as_str()
        );
        Ok(CaptureReceipt { external_ref: None })
    }

    async fn refund(&self, _receipt: &CaptureReceipt, request: &CaptureRequest) -> AppResult<()> {
        info!(
            "local refund: ticket={}, amount={} {}",
            request.ticket_id, request.amount_minor, request.currency
        );
        Ok(())
    }
}

/* ---------- Stripe ---------- */

type StripeBreaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::Constant>, ()>;

/// Failures that count against the circuit breaker.
#[derive(Debug, thiserror::Error)]
enum StripeFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("stripe responded with {0}")]
    Upstream(reqwest::StatusCode),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeApiError {
    pub message: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub last_payment_error: Option<StripeApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeApiError,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StripeResponse {
    Error { error: StripeApiError },
    Intent(PaymentIntent),
}

#[derive(Clone)]
pub struct StripeGateway {
    secret_key: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: StripeBreaker,
}

impl StripeGateway {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> AppResult<Self> {
        let secret_key = payment.stripe_secret_key.clone().ok_or_else(|| {
            AppError::Internal("STRIPE_SECRET_KEY must be set when PAYMENT_PROVIDER=stripe".to_string())
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(payment.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::new(
            secret_key,
            payment.stripe_api_base.clone(),
            http_client,
            breaker.failure_threshold,
            Duration::from_secs(breaker.timeout_seconds),
        ))
    }

    pub fn new(
        secret_key: String,
        base_url: String,
        http_client: reqwest::Client,
        failure_threshold: u32,
        open_for: Duration,
    ) -> Self {
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff::constant(open_for));
        let circuit_breaker = failsafe::Config::new().failure_policy(policy).build();

        Self {
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker,
        }
    }

    /// Creates and confirms a PaymentIntent in one call.
    pub async fn create_payment_intent(&self, request: &CaptureRequest) -> AppResult<PaymentIntent> {
        let payment_method = request.stripe_payment_method.clone().ok_or_else(|| {
            AppError::validation("stripe_payment_method", "Card details are required for Stripe payments.")
        })?;

        let params = [
            ("amount", request.amount_minor.to_string()),
            ("currency", request.currency.clone()),
            ("payment_method", payment_method),
            ("confirm", "true".to_string()),
            ("description", request.description.clone()),
            ("receipt_email", request.receipt_email.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
            ("metadata[ticket_id]", request.ticket_id.to_string()),
        ];

        info!(
            "creating Stripe PaymentIntent: ticket={}, amount={} {}",
            request.ticket_id, request.amount_minor, request.currency
        );

        let operation = async {
            let response = self
                .http_client
                .post(format!("{}/v1/payment_intents", self.base_url))
                .bearer_auth(&self.secret_key)
                .header("Idempotency-Key", &request.idempotency_key)
                .form(&params)
                .send()
                .await?;

            let status = response.status();
            if status.is_server_error() {
                return Err(StripeFailure::Upstream(status));
            }
            Ok(response.json::<StripeResponse>().await?)
        };

        match self.circuit_breaker.call(operation).await {
            Ok(StripeResponse::Intent(intent)) if intent.status == "succeeded" => Ok(intent),
            Ok(StripeResponse::Intent(intent)) => {
                let reason = intent
                    .last_payment_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("payment status is {}", intent.status));
                warn!("PaymentIntent {} not captured: {}", intent.id, reason);
                Err(AppError::PaymentGateway(reason))
            }
            Ok(StripeResponse::Error { error }) => {
                warn!(
                    "Stripe rejected payment: type={:?}, code={:?}, decline_code={:?}",
                    error.kind, error.code, error.decline_code
                );
                Err(AppError::PaymentGateway(
                    error.message.unwrap_or_else(|| "Your card was declined.".to_string()),
                ))
            }
            Err(failsafe::Error::Rejected) => {
                warn!("circuit breaker is OPEN - blocking Stripe request");
                Err(AppError::PaymentGateway(
                    "Payment gateway temporarily unavailable. Please try again later.".to_string(),
                ))
            }
            Err(failsafe::Error::Inner(e)) => {
                error!("Stripe request failed: {}", e);
                Err(AppError::PaymentGateway("Payment gateway error.".to_string()))
            }
        }
    }
}

impl StripeGateway {
    /// Refunds a PaymentIntent in full. Bypasses the circuit breaker so a
    /// tripped breaker never strands a charge.
    pub async fn refund_payment_intent(&self, payment_intent: &str, idempotency_key: &str) -> AppResult<Refund> {
        let response = self
            .http_client
            .post(format!("{}/v1/refunds", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("refund-{idempotency_key}"))
            .form(&[("payment_intent", payment_intent)])
            .send()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("refund request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("stripe responded with {status}"));
            return Err(AppError::PaymentGateway(message));
        }

        let refund = response
            .json::<Refund>()
            .await
            .map_err(|e| AppError::PaymentGateway(format!("unreadable refund response: {e}")))?;
        match refund.status.as_str() {
            "succeeded" | "pending" => Ok(refund),
            other => Err(AppError::PaymentGateway(format!("refund {} is {}", refund.id, other))),
        }
    }
}

impl PaymentGateway for StripeGateway {
    async fn capture(&self, request: CaptureRequest) -> AppResult<CaptureReceipt> {
        let intent = self.create_payment_intent(&request).await?;
        info!("PaymentIntent {} succeeded for ticket {}", intent.id, request.ticket_id);
        Ok(CaptureReceipt { external_ref: Some(intent.id) })
    }

    async fn refund(&self, receipt: &CaptureReceipt, request: &CaptureRequest) -> AppResult<()> {
        let Some(intent_id) = receipt.external_ref.as_deref() else {
            return Ok(());
        };
        let refund = self.refund_payment_intent(intent_id, &request.idempotency_key).await?;
        info!(
            "refund {} ({}) issued for PaymentIntent {} on ticket {}",
            refund.id, refund.status, intent_id, request.ticket_id
        );
        Ok(())
    }

    fn requires_payment_token(&self) -> bool {
        true
    }
}

/* ---------- selection ---------- */

#[derive(Clone)]
pub enum Gateway {
    Local(LocalCapture),
    Stripe(StripeGateway),
}

impl Gateway {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> AppResult<Self> {
        match payment.provider {
            PaymentProvider::Local => Ok(Gateway::Local(LocalCapture)),
            PaymentProvider::Stripe => Ok(Gateway::Stripe(StripeGateway::from_config(payment, breaker)?)),
        }
    }
}

impl PaymentGateway for Gateway {
    async fn capture(&self, request: CaptureRequest) -> AppResult<CaptureReceipt> {
        match self {
            Gateway::Local(local) => local.capture(request).await,
            Gateway::Stripe(stripe) => stripe.capture(request).await,
        }
    }

    async fn refund(&self, receipt: &CaptureReceipt, request: &CaptureRequest) -> AppResult<()> {
        match self {
            Gateway::Local(local) => local.refund(receipt, request).await,
            Gateway::Stripe(stripe) => stripe.refund(receipt, request).await,
        }
    }

    fn requires_payment_token(&self) -> bool {
        match self {
            Gateway::Local(local) => local.requires_payment_token(),
            Gateway::Stripe(stripe) => stripe.requires_payment_token(),
        }
    }
}
