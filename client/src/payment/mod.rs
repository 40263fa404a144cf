//! Payment link creation and status polling.
//!
//! One task drives `Pending → Polling → {Succeeded, Expired, Cancelled}`.
//! Observers follow along through a `watch` channel; the task owns its timers,
//! so ending it stops both the status checks and the overall deadline.

pub mod reference;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    config::PaymentConfig,
    error::{ClientError, Result},
    lifetime::LifetimeToken,
    models::payment::{
        CreatePaymentRequest, InvoiceRef, PaymentLink, PaymentRequestInfo, PaymentStatus,
        VerifyPaymentRequest,
    },
};

/// Backend seam for the payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_link(&self, req: &CreatePaymentRequest) -> Result<PaymentLink>;
    async fn order_status(&self, order_code: i64) -> Result<PaymentRequestInfo>;
    async fn verify(&self, req: &VerifyPaymentRequest) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentState {
    /// Creating the payment link.
    Pending,
    Polling { link: PaymentLink },
    Succeeded { order_code: i64 },
    Expired,
    Cancelled,
    /// Polling gave up; carries the last error message.
    Failed { message: String },
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentState::Pending | PaymentState::Polling { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded { order_code: i64 },
    Expired,
    Cancelled,
}

impl From<PaymentOutcome> for PaymentState {
    fn from(outcome: PaymentOutcome) -> Self {
        match outcome {
            PaymentOutcome::Succeeded { order_code } => PaymentState::Succeeded { order_code },
            PaymentOutcome::Expired => PaymentState::Expired,
            PaymentOutcome::Cancelled => PaymentState::Cancelled,
        }
    }
}

pub struct PaymentPoller<G> {
    gateway: Arc<G>,
    config: PaymentConfig,
    state: watch::Sender<PaymentState>,
}

impl<G: PaymentGateway> PaymentPoller<G> {
    pub fn new(gateway: Arc<G>, config: PaymentConfig) -> Self {
        let (state, _rx) = watch::channel(PaymentState::Pending);
        Self {
            gateway,
            config,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PaymentState {
        self.state.borrow().clone()
    }

    fn publish(&self, state: PaymentState) {
        self.state.send_replace(state);
    }

    fn finish(&self, outcome: PaymentOutcome) -> Result<PaymentOutcome> {
        tracing::info!(?outcome, "Payment finished");
        self.publish(outcome.into());
        Ok(outcome)
    }

    fn fail(&self, err: ClientError) -> Result<PaymentOutcome> {
        self.publish(PaymentState::Failed {
            message: err.user_message(),
        });
        Err(err)
    }

    /// Creates a payment link for `invoice` and polls it until the payment
    /// settles, the deadline passes or `token` ends.
    pub async fn run(
        &self,
        invoice: InvoiceRef,
        request: CreatePaymentRequest,
        mut token: LifetimeToken,
    ) -> Result<PaymentOutcome> {
        self.publish(PaymentState::Pending);

        let created = tokio::select! {
            res = self.gateway.create_link(&request) => res,
            _ = token.ended() => return self.finish(PaymentOutcome::Cancelled),
        };
        let link = match created {
            Ok(link) => link,
            Err(e) => return self.fail(e),
        };
        let order_code = link.order_code;
        tracing::info!(order_code, invoice_id = invoice.invoice_id, "Payment link created");
        self.publish(PaymentState::Polling { link });

        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);
        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = token.ended() => return self.finish(PaymentOutcome::Cancelled),
                _ = &mut deadline => {
                    tracing::info!(order_code, "Payment window elapsed");
                    return self.finish(PaymentOutcome::Expired);
                }
                _ = ticker.tick() => {}
            }

            let checked = tokio::select! {
                res = self.gateway.order_status(order_code) => res,
                _ = token.ended() => return self.finish(PaymentOutcome::Cancelled),
            };

            match checked {
                Ok(info) => {
                    failures = 0;
                    match info.status {
                        PaymentStatus::Paid => {
                            let verify = VerifyPaymentRequest {
                                order_code,
                                invoice_id: invoice.invoice_id,
                            };
                            let verified = tokio::select! {
                                res = self.gateway.verify(&verify) => res,
                                _ = token.ended() => return self.finish(PaymentOutcome::Cancelled),
                            };
                            if let Err(e) = verified {
                                tracing::warn!(order_code, error = %e, "Payment received but verification failed");
                                return self.fail(e);
                            }
                            return self.finish(PaymentOutcome::Succeeded { order_code });
                        }
                        PaymentStatus::Cancelled => return self.finish(PaymentOutcome::Cancelled),
                        PaymentStatus::Expired => return self.finish(PaymentOutcome::Expired),
                        status => tracing::debug!(order_code, ?status, "Payment not settled yet"),
                    }
                }
                Err(ClientError::Unauthorized) => return self.fail(ClientError::Unauthorized),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(order_code, failures, error = %e, "Payment status check failed");
                    if failures >= self.config.max_consecutive_failures {
                        return self.fail(e);
                    }
                }
            }
        }
    }
}
