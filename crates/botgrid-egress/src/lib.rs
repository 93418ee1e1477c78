//! botgrid-egress — fan-out of worker-initiated Telegram calls.
//!
//! Workers publish `(bot_token, method, params)` commands onto their
//! egress topics; this service discovers those topics, consumes each
//! one in a shared group, and dispatches the commands to the Telegram
//! API. Delivery is at-most-once: offsets advance whether or not the
//! Telegram call succeeded, because blindly retrying non-idempotent
//! methods is worse than dropping one call.

pub mod processor;

pub use processor::FanoutProcessor;
