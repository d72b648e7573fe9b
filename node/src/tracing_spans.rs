//! Named [`tracing::Span`] constructors for node operations, so every log line
//! emitted while serving one of them carries the same span name and fields.

use tracing::{info_span, Span};

pub fn transfer_span(principal: &str, nonce: &str) -> Span {
    info_span!("transfer", principal = %principal, nonce = %nonce)
}

pub fn seal_span(tx_count: usize, difficulty: u32) -> Span {
    info_span!("seal", tx_count, difficulty)
}

pub fn validate_span() -> Span {
    info_span!("validate_chain")
}

pub fn levy_span(tick_secs: u64) -> Span {
    info_span!("levy_tick", tick = tick_secs)
}
