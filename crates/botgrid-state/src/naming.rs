//! Derived resource names.
//!
//! Three services mutate resources named after the same bot id, so every
//! derived name lives here as a pure function. Topic names are never
//! accepted as external input.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::types::TopicPair;

/// Set key holding all known bot ids.
pub const BOTS_SET_KEY: &str = "bots:all";

/// Consumer group shared by every egress gateway replica.
pub const EGRESS_GATEWAY_GROUP: &str = "botgrid-egress";

/// Generate a fresh bot id: `bot_` + 16 hex chars from the OS CSPRNG.
pub fn generate_bot_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("bot_{hex}")
}

/// Ingress topic carrying Telegram updates toward the workers.
pub fn ingress_topic(bot_id: &str) -> String {
    format!("bot_{bot_id}_incoming")
}

/// Egress topic carrying worker-initiated Telegram API calls.
pub fn egress_topic(bot_id: &str) -> String {
    format!("bot_{bot_id}_outgoing")
}

/// Consumer group used by a bot's own workers.
pub fn worker_group(bot_id: &str) -> String {
    format!("bot_{bot_id}_workers")
}

/// Both per-bot topics.
pub fn topic_pair(bot_id: &str) -> TopicPair {
    TopicPair {
        incoming: ingress_topic(bot_id),
        outgoing: egress_topic(bot_id),
    }
}

/// Whether a topic name matches the egress naming pattern.
pub fn is_egress_topic(topic: &str) -> bool {
    topic.starts_with("bot_") && topic.ends_with("_outgoing") && topic.len() > "bot__outgoing".len()
}

/// Name of the workload running a bot's containers.
pub fn workload_name(bot_id: &str) -> String {
    format!("bot-{bot_id}")
}

/// Name of the secret holding a bot's token and user env vars.
pub fn secret_name(bot_id: &str) -> String {
    format!("{}-secrets", workload_name(bot_id))
}

/// Name of the autoscaler object targeting a bot's workload.
pub fn scaler_name(bot_id: &str) -> String {
    format!("{}-scaler", workload_name(bot_id))
}

/// Storage key of a bot's persisted record.
pub fn config_key(bot_id: &str) -> String {
    format!("bot:config:{bot_id}")
}

/// Storage key of the token → bot id index entry.
pub fn token_key(bot_token: &str) -> String {
    format!("bot:token:{bot_token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_match_format() {
        for _ in 0..16 {
            let id = generate_bot_id();
            assert_eq!(id.len(), 4 + 16);
            assert!(id.starts_with("bot_"));
            assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_bot_id();
        let b = generate_bot_id();
        assert_ne!(a, b);
    }

    #[test]
    fn topic_names_derive_from_bot_id() {
        let pair = topic_pair("bot_0123456789abcdef");
        assert_eq!(pair.incoming, "bot_bot_0123456789abcdef_incoming");
        assert_eq!(pair.outgoing, "bot_bot_0123456789abcdef_outgoing");
        assert_eq!(
            worker_group("bot_0123456789abcdef"),
            "bot_bot_0123456789abcdef_workers"
        );
    }

    #[test]
    fn egress_pattern_filters() {
        assert!(is_egress_topic("bot_bot_0123456789abcdef_outgoing"));
        assert!(is_egress_topic(&egress_topic("bot_0123456789abcdef")));
        assert!(is_egress_topic("bot_x_outgoing"));
        assert!(!is_egress_topic("bot_bot_0123456789abcdef_incoming"));
        assert!(!is_egress_topic("orders_outgoing"));
        assert!(!is_egress_topic("bot__outgoing"));
        assert!(!is_egress_topic("__consumer_offsets"));
    }

    #[test]
    fn workload_object_names() {
        assert_eq!(workload_name("bot_ab12"), "bot-bot_ab12");
        assert_eq!(secret_name("bot_ab12"), "bot-bot_ab12-secrets");
        assert_eq!(scaler_name("bot_ab12"), "bot-bot_ab12-scaler");
    }

    #[test]
    fn storage_keys() {
        assert_eq!(config_key("bot_ab12"), "bot:config:bot_ab12");
        assert_eq!(token_key("123:ABC"), "bot:token:123:ABC");
    }
}
