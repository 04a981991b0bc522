use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-test-1";
pub const DEFAULT_MEMORY_SIZE_MB: u32 = 128;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Harness-wide defaults copied into every invocation context.
///
/// The timeout is informational: it is reported through
/// [`InvocationContext::remaining_time`](crate::InvocationContext::remaining_time)
/// but never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaMockConfig {
    pub region: String,
    pub memory_size_mb: u32,
    pub timeout: Duration,
}

impl Default for LambdaMockConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            memory_size_mb: DEFAULT_MEMORY_SIZE_MB,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
