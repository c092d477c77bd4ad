/// Classification for retry policy.
///
/// Used by the client to decide what happens after a provider call fails.
///
/// # Behavior Summary
///
/// | Class | Retry Same Provider? | Try Next Provider? |
/// |-------|---------------------|--------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, up to the retry bound | Yes, once retries are used up |
/// | `NextProvider` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - the request itself is invalid, or the caller gave up.
    /// Another provider would fail the same way.
    Never,

    /// Retry the same provider after a fixed backoff.
    ///
    /// Used for transient failures: connection errors, non-2xx statuses and
    /// upstream quota signals. These often clear on their own within seconds.
    WithBackoff,

    /// Give up on this provider and move to the next one without retrying.
    ///
    /// Used when the provider answered but the payload was unusable. The same
    /// ticker will produce the same payload on retry.
    NextProvider,
}
