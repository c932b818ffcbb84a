use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Approved {
        transaction_id: String,
        reference: String,
    },
    Declined {
        message: String,
    },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, amount: f64, method: &str) -> GatewayOutcome;
}

/// Stand-in for a card processor: waits `latency`, then approves with
/// probability `success_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    success_rate: f64,
    latency: Duration,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64, latency: Duration) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            latency,
        }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(0.9, Duration::from_secs(2))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, amount: f64, method: &str) -> GatewayOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let approved = rand::thread_rng().gen_bool(self.success_rate);
        if approved {
            log::debug!("Simulated {method} charge of {amount:.2} approved");
            GatewayOutcome::Approved {
                transaction_id: transaction_id(),
                reference: format!("REF_{}", chrono::Utc::now().timestamp_millis()),
            }
        } else {
            GatewayOutcome::Declined {
                message: "Payment failed. Please try again.".to_string(),
            }
        }
    }
}

/// `TXN_<unix millis>_<9 base36 chars>`.
fn transaction_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("TXN_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_have_expected_shape() {
        let id = transaction_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "TXN");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }

    #[actix_web::test]
    async fn certain_outcomes() {
        let always = SimulatedGateway::new(1.0, Duration::ZERO);
        match always.charge(350.0, "card").await {
            GatewayOutcome::Approved { transaction_id, reference } => {
                assert!(transaction_id.starts_with("TXN_"));
                assert!(reference.starts_with("REF_"));
            }
            other => panic!("expected approval, got {other:?}"),
        }

        let never = SimulatedGateway::new(0.0, Duration::ZERO);
        assert!(matches!(
            never.charge(350.0, "card").await,
            GatewayOutcome::Declined { .. }
        ));
    }

    #[test]
    fn success_rate_is_clamped() {
        let gateway = SimulatedGateway::new(4.2, Duration::ZERO);
        assert_eq!(gateway.success_rate, 1.0);
    }
}
