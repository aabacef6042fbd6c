/*
    Metrics - counters for data store traffic

    Recorded through the `metrics` facade. Nothing is exported unless the host
    application installs a recorder.
*/

use metrics::{counter, describe_counter};

/// Register metric descriptions (call once at startup)
pub fn init_metrics() {
    describe_counter!(
        "datastore_requests_total",
        "Requests handled by the session server, labeled by kind (FetchOrAdd, CompareExchange)"
    );

    describe_counter!(
        "datastore_exchanged_total",
        "Compare-exchange requests that replaced a value"
    );

    describe_counter!(
        "datastore_fetched_total",
        "Requests answered with the current server value"
    );

    describe_counter!(
        "datastore_replication_values_total",
        "Key/value pairs pushed to clients in replication events"
    );

    describe_counter!(
        "datastore_client_cache_hits_total",
        "Client operations answered from the local cache without a round trip"
    );

    describe_counter!(
        "datastore_client_unexpected_errors_total",
        "Client operations that failed on serialization, transport or timeout"
    );
}

/// Record one request of `kind` handled by the server
pub fn record_request(kind: &'static str) {
    counter!("datastore_requests_total", "kind" => kind).increment(1);
}

pub fn record_exchange() {
    counter!("datastore_exchanged_total").increment(1);
}

pub fn record_fetch() {
    counter!("datastore_fetched_total").increment(1);
}

/// Record a replication event carrying `values` pairs
pub fn record_replication_event(values: usize) {
    counter!("datastore_replication_values_total").increment(values as u64);
}

pub fn record_cache_hit() {
    counter!("datastore_client_cache_hits_total").increment(1);
}

pub fn record_unexpected_error() {
    counter!("datastore_client_unexpected_errors_total").increment(1);
}
