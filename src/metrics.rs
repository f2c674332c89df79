//! Prometheus metrics for the bridge
//!
//! All collectors live in the default registry so `render()` can dump the
//! whole set in text exposition format at the end of a session.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// JSON-RPC requests sent to the tool server, by method and status
    pub static ref RPC_REQUESTS: CounterVec = register_counter_vec!(
        "kubebridge_rpc_requests_total",
        "JSON-RPC requests sent to the tool server",
        &["method", "status"]
    )
    .expect("failed to register RPC_REQUESTS metric");

    /// Round-trip time of JSON-RPC requests
    pub static ref RPC_DURATION: HistogramVec = register_histogram_vec!(
        "kubebridge_rpc_duration_seconds",
        "JSON-RPC round-trip time",
        &["method"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("failed to register RPC_DURATION metric");

    /// Tool invocations by tool name and outcome
    pub static ref TOOL_CALLS: CounterVec = register_counter_vec!(
        "kubebridge_tool_calls_total",
        "Tool invocations requested by the agent",
        &["tool", "outcome"]
    )
    .expect("failed to register TOOL_CALLS metric");

    /// Language-model completion latency
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "kubebridge_llm_call_duration_seconds",
        "Language model completion latency",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("failed to register LLM_CALL_TIME metric");

    /// Directive parse results (invocation, plain, malformed)
    pub static ref DIRECTIVES: CounterVec = register_counter_vec!(
        "kubebridge_directives_total",
        "Directive parse results for agent replies",
        &["result"]
    )
    .expect("failed to register DIRECTIVES metric");

    /// Whether the network server was reused or spawned
    pub static ref SERVER_LAUNCHES: CounterVec = register_counter_vec!(
        "kubebridge_server_launches_total",
        "Tool server launches by mode",
        &["mode"]
    )
    .expect("failed to register SERVER_LAUNCHES metric");
}

/// Render every registered metric in Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        DIRECTIVES.with_label_values(&["plain"]).inc();
        RPC_REQUESTS.with_label_values(&["tools/list", "ok"]).inc();

        let text = render();
        assert!(text.contains("kubebridge_directives_total"));
        assert!(text.contains("kubebridge_rpc_requests_total"));
    }
}
