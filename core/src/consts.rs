use std::time::Duration;

/// Agent's dial timeout when connecting out to the broker (§5).
pub const AGENT_BROKER_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Agent's dial timeout when connecting to its configured target.
pub const AGENT_TARGET_DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Operator proxy's dial timeout when connecting to the broker.
pub const PROXY_BROKER_DIAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between the agent's reconnect attempts after any failure.
pub const AGENT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Grace period the broker allows in-flight handlers on shutdown.
pub const BROKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
