use serde::Deserialize;

/// Policy for what happens when `PaymentCapture` fails after the
/// upstream call already succeeded.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFailurePolicy {
    /// Surface a `500` to the client; the upstream side effect already
    /// happened and is not rolled back.
    FailClosed,
    /// Mirror the upstream success to the client even though settlement
    /// failed; the operator eats the cost. Recorded in analytics either way.
    FailOpen,
    /// Return the upstream success to the client and enqueue the
    /// settlement for an out-of-process retry. The gateway does not
    /// implement the retry worker or a durable queue; it only marks the
    /// payment row so an external worker can pick it up.
    QueueForRetry,
}

impl Default for CaptureFailurePolicy {
    fn default() -> Self {
        CaptureFailurePolicy::FailClosed
    }
}

/// Payment-subsystem configuration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PaymentConfig {
    #[serde(default)]
    pub capture_failure_policy: CaptureFailurePolicy,
    #[serde(default = "default_x402_version")]
    pub x402_version: u32,
}

fn default_x402_version() -> u32 {
    1
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        crate::envy_load!("payment", "PAYMENT_")
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            capture_failure_policy: CaptureFailurePolicy::default(),
            x402_version: default_x402_version(),
        }
    }
}
