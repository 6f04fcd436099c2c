//! Payment gateway seam.
//!
//! The core initiates a payment and receives the terminal status later via
//! an asynchronous callback; it never observes settlement synchronously.

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::PaymentStatus;
use crate::catalog::PaymentMethod;
use crate::error::PaymentError;

/// An initiated, not-yet-settled payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub reference: String,
    pub status: PaymentStatus,
}

/// Asynchronous gateway callback payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentCallback {
    pub reference: String,
    pub result_code: i64,
}

impl PaymentCallback {
    /// Map the gateway result code onto a payment status (0 = success).
    pub fn status(&self) -> PaymentStatus {
        if self.result_code == 0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        }
    }
}

/// Initiates payments; settlement arrives via `PaymentCallback`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        identity: &str,
    ) -> Result<PaymentIntent, PaymentError>;
}

/// Gateway that settles nothing — every initiation succeeds with a
/// simulated reference. Used in tests and when no credentials exist.
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn initiate(
        &self,
        method: PaymentMethod,
        _amount: Decimal,
        _identity: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        Ok(PaymentIntent {
            reference: simulated_reference(method),
            status: PaymentStatus::Pending,
        })
    }
}

fn simulated_reference(method: PaymentMethod) -> String {
    let prefix = match method {
        PaymentMethod::MobileMoney => "SIM",
        PaymentMethod::Insurance => "INS",
        PaymentMethod::Wallet => "WAL",
    };
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// M-Pesa-style STK-push configuration.
#[derive(Clone)]
pub struct MpesaConfig {
    pub consumer_key: SecretString,
    pub consumer_secret: SecretString,
    pub business_short_code: String,
    pub passkey: SecretString,
    /// Sandbox or production API base.
    pub base_url: String,
    /// Where the gateway posts its asynchronous result.
    pub callback_url: String,
}

/// Live gateway: STK push for mobile money, simulated flows for insurance
/// and wallet (those settle out-of-band in this deployment).
pub struct MpesaGateway {
    client: reqwest::Client,
    config: MpesaConfig,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn stk_push(
        &self,
        amount: Decimal,
        identity: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let token = self.access_token().await?;
        let body = serde_json::json!({
            "BusinessShortCode": self.config.business_short_code,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": amount.round().to_string(),
            "PartyA": identity,
            "PartyB": self.config.business_short_code,
            "PhoneNumber": identity,
            "CallBackURL": self.config.callback_url,
            "AccountReference": "CarePod",
            "TransactionDesc": "CarePod logistics fee",
        });

        let resp = self
            .client
            .post(format!(
                "{}/mpesa/stkpush/v1/processrequest",
                self.config.base_url
            ))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: e.to_string(),
            })?;

        let payload: serde_json::Value =
            resp.json().await.map_err(|e| PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: e.to_string(),
            })?;

        match payload.get("ResponseCode").and_then(|v| v.as_str()) {
            Some("0") => {
                let reference = payload
                    .get("CheckoutRequestID")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                tracing::info!(reference, "STK push sent");
                Ok(PaymentIntent {
                    reference,
                    status: PaymentStatus::Pending,
                })
            }
            _ => Err(PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: payload
                    .get("ResponseDescription")
                    .and_then(|v| v.as_str())
                    .unwrap_or("gateway rejected request")
                    .to_string(),
            }),
        }
    }

    async fn access_token(&self) -> Result<String, PaymentError> {
        let resp = self
            .client
            .get(format!(
                "{}/oauth/v1/generate?grant_type=client_credentials",
                self.config.base_url
            ))
            .basic_auth(
                self.config.consumer_key.expose_secret(),
                Some(self.config.consumer_secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: format!("token request: {e}"),
            })?;

        let payload: serde_json::Value =
            resp.json().await.map_err(|e| PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: format!("token response: {e}"),
            })?;

        payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| PaymentError::InitiationFailed {
                method: "mobile_money".into(),
                reason: "no access token in response".into(),
            })
    }
}

#[async_trait]
impl PaymentGateway for MpesaGateway {
    async fn initiate(
        &self,
        method: PaymentMethod,
        amount: Decimal,
        identity: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        match method {
            PaymentMethod::MobileMoney => self.stk_push(amount, identity).await,
            // Insurance and wallet settle out-of-band; hand back a
            // trackable reference immediately.
            PaymentMethod::Insurance | PaymentMethod::Wallet => Ok(PaymentIntent {
                reference: simulated_reference(method),
                status: PaymentStatus::Pending,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn callback_result_code_mapping() {
        let ok = PaymentCallback {
            reference: "ref".into(),
            result_code: 0,
        };
        assert_eq!(ok.status(), PaymentStatus::Paid);

        let failed = PaymentCallback {
            reference: "ref".into(),
            result_code: 1032,
        };
        assert_eq!(failed.status(), PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn simulated_gateway_returns_pending_intent() {
        let gateway = SimulatedGateway;
        let intent = gateway
            .initiate(PaymentMethod::MobileMoney, dec!(200), "+254700000001")
            .await
            .unwrap();
        assert_eq!(intent.status, PaymentStatus::Pending);
        assert!(intent.reference.starts_with("SIM-"));
    }

    #[tokio::test]
    async fn simulated_references_are_unique() {
        let gateway = SimulatedGateway;
        let a = gateway
            .initiate(PaymentMethod::Wallet, dec!(200), "x")
            .await
            .unwrap();
        let b = gateway
            .initiate(PaymentMethod::Wallet, dec!(200), "x")
            .await
            .unwrap();
        assert_ne!(a.reference, b.reference);
    }
}
