use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    static ref REQUESTS: Option<IntCounterVec> = register_int_counter_vec!(
        "cecbridge_requests_total",
        "HTTP requests handled, by route and status code",
        &["route", "status"]
    )
    .ok();
    static ref CEC_COMMANDS: Option<IntCounterVec> = register_int_counter_vec!(
        "cecbridge_cec_commands_total",
        "cec-client commands run, by command and outcome",
        &["command", "outcome"]
    )
    .ok();
}

pub fn record_request(route: &str, status: u16) {
    if let Some(c) = REQUESTS.as_ref() {
        let status = status.to_string();
        c.with_label_values(&[route, status.as_str()]).inc();
    }
}

pub fn record_cec_command(command: &str, outcome: &str) {
    if let Some(c) = CEC_COMMANDS.as_ref() {
        c.with_label_values(&[command, outcome]).inc();
    }
}

/// Text exposition of every registered metric.
pub fn gather() -> Result<String, prometheus::Error> {
    let metrics = prometheus::gather();
    let encoder = prometheus::TextEncoder::new();
    encoder.encode_to_string(&metrics)
}
