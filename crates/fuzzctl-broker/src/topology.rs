//! Exchange, queue, and header names.

/// Fanout exchange the scheduler publishes dispatched tasks to.
pub const EXCHANGE_TASK_BROADCAST: &str = "task_broadcast";
/// Fanout exchange the scheduler publishes newly observed bugs to.
pub const EXCHANGE_TRIAGE: &str = "triage";
/// Fanout exchange the scheduler publishes newly observed SARIF records to.
pub const EXCHANGE_SARIF: &str = "sarif";
/// Direct exchange the builder publishes built fuzzlets to, keyed by project.
pub const EXCHANGE_FUZZLET: &str = "fuzzlet";
/// Fanout exchange a message is routed to once it exceeds [`MAX_REQUEUE_ATTEMPTS`].
pub const EXCHANGE_DEAD_LETTER: &str = "dead_letter";
/// Fanout exchange the gateway publishes inbound control messages to (task
/// dispatch hints and cancellations); the scheduler is the only consumer.
pub const EXCHANGE_INBOUND: &str = "inbound";

/// Header carrying the manual retry count for the requeue-then-deadletter policy.
pub const HEADER_RETRY_COUNT: &str = "x-fuzzctl-retry-count";

/// Messages nacked this many times are routed to the dead-letter queue instead
/// of requeued again.
pub const MAX_REQUEUE_ATTEMPTS: u32 = 3;

/// Prefetch count for all consumers: one in-flight message per channel, so a
/// slow task never starves the rest of the queue behind it.
pub const PREFETCH_COUNT: u16 = 1;
