//! Subscription metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, gauge};

const CREATED: &str = "subscription_created_total";
const CONFIRMATIONS: &str = "subscription_confirmations_total";
const TIMEOUTS: &str = "subscription_timeouts_total";
const CALLBACK_FAILURES: &str = "subscription_callback_failures_total";
const ACTIVE_LISTENERS: &str = "subscription_active_listeners";

/// Register metric descriptions with the global registry.
pub fn describe() {
    describe_counter!(CREATED, "Total number of transaction subscriptions created");
    describe_counter!(
        CONFIRMATIONS,
        "Total number of confirmations delivered to callbacks"
    );
    describe_counter!(
        TIMEOUTS,
        "Total number of listeners retired by the confirmation timeout"
    );
    describe_counter!(
        CALLBACK_FAILURES,
        "Total number of confirmation callbacks that failed"
    );
    describe_gauge!(
        ACTIVE_LISTENERS,
        "Confirmation listeners currently attached to a transport"
    );
}

pub(crate) fn record_created() {
    counter!(CREATED).increment(1);
}

pub(crate) fn record_confirmation() {
    counter!(CONFIRMATIONS).increment(1);
}

pub(crate) fn record_timeout() {
    counter!(TIMEOUTS).increment(1);
}

pub(crate) fn record_callback_failure() {
    counter!(CALLBACK_FAILURES).increment(1);
}

pub(crate) fn record_listener_attached() {
    gauge!(ACTIVE_LISTENERS).increment(1.0);
}

pub(crate) fn record_listener_detached() {
    gauge!(ACTIVE_LISTENERS).decrement(1.0);
}
