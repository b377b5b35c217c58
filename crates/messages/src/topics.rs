//! Topic and subscription naming.
//!
//! Short names follow the `commands.<domain>.<verb>` /
//! `events.<domain>.<past-tense>` convention; full names are namespaced by
//! the project id the way the production bus expects
//! (`projects/<project>/topics/<short>`).

// Command topics (consumed by participants).
pub const CMD_CREDIT_RESERVE: &str = "commands.credit.reserve";
pub const CMD_CREDIT_RELEASE: &str = "commands.credit.release";
pub const CMD_VEHICLE_RESERVE: &str = "commands.vehicle.reserve";
pub const CMD_VEHICLE_RELEASE: &str = "commands.vehicle.release";
pub const CMD_PAYMENT_GENERATE_CODE: &str = "commands.payment.generate_code";
pub const CMD_PAYMENT_PROCESS: &str = "commands.payment.process";
pub const CMD_PAYMENT_REFUND: &str = "commands.payment.refund";

// Event topics (consumed by the orchestrator; cancellation outcomes are
// published for external observers).
pub const EVT_CREDIT_RESERVED: &str = "events.credit.reserved";
pub const EVT_CREDIT_RESERVATION_FAILED: &str = "events.credit.reservation_failed";
pub const EVT_CREDIT_RELEASED: &str = "events.credit.released";
pub const EVT_VEHICLE_RESERVED: &str = "events.vehicle.reserved";
pub const EVT_VEHICLE_RESERVATION_FAILED: &str = "events.vehicle.reservation_failed";
pub const EVT_VEHICLE_RELEASED: &str = "events.vehicle.released";
pub const EVT_PAYMENT_CODE_GENERATED: &str = "events.payment.code_generated";
pub const EVT_PAYMENT_CODE_GENERATION_FAILED: &str = "events.payment.code_generation_failed";
pub const EVT_PAYMENT_PROCESSED: &str = "events.payment.processed";
pub const EVT_PAYMENT_FAILED: &str = "events.payment.failed";
pub const EVT_PAYMENT_REFUNDED: &str = "events.payment.refunded";
pub const EVT_PAYMENT_REFUND_FAILED: &str = "events.payment.refund_failed";
pub const EVT_PURCHASE_CANCELLED: &str = "events.purchase.cancelled";
pub const EVT_PURCHASE_CANCELLATION_FAILED: &str = "events.purchase.cancellation_failed";

/// Every command topic, in the order participants ensure them.
pub const COMMAND_TOPICS: &[&str] = &[
    CMD_CREDIT_RESERVE,
    CMD_CREDIT_RELEASE,
    CMD_VEHICLE_RESERVE,
    CMD_VEHICLE_RELEASE,
    CMD_PAYMENT_GENERATE_CODE,
    CMD_PAYMENT_PROCESS,
    CMD_PAYMENT_REFUND,
];

/// Every event topic the orchestrator subscribes to.
pub const EVENT_TOPICS: &[&str] = &[
    EVT_CREDIT_RESERVED,
    EVT_CREDIT_RESERVATION_FAILED,
    EVT_CREDIT_RELEASED,
    EVT_VEHICLE_RESERVED,
    EVT_VEHICLE_RESERVATION_FAILED,
    EVT_VEHICLE_RELEASED,
    EVT_PAYMENT_CODE_GENERATED,
    EVT_PAYMENT_CODE_GENERATION_FAILED,
    EVT_PAYMENT_PROCESSED,
    EVT_PAYMENT_FAILED,
    EVT_PAYMENT_REFUNDED,
    EVT_PAYMENT_REFUND_FAILED,
];

/// Resolves short topic names to fully-qualified, project-scoped names, and
/// derives per-consumer subscription names.
#[derive(Debug, Clone)]
pub struct Naming {
    project_id: String,
}

impl Naming {
    /// Creates a naming scheme for the given project namespace.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    /// Returns the project namespace.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Fully-qualified topic name for a short topic name.
    pub fn topic(&self, short: &str) -> String {
        format!("projects/{}/topics/{}", self.project_id, short)
    }

    /// Fully-qualified subscription name for a consumer on a topic.
    ///
    /// Follows the `<service>-<topic-short>-sub` convention, with the
    /// `commands.`/`events.` prefix dropped and dots flattened to dashes
    /// (`orchestrator` + `events.credit.reserved` →
    /// `orchestrator-credit-reserved-sub`).
    pub fn subscription(&self, service: &str, topic_short: &str) -> String {
        let short = topic_short
            .strip_prefix("commands.")
            .or_else(|| topic_short.strip_prefix("events."))
            .unwrap_or(topic_short)
            .replace('.', "-");
        format!(
            "projects/{}/subscriptions/{}-{}-sub",
            self.project_id, service, short
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_are_project_scoped() {
        let naming = Naming::new("saga-project");
        assert_eq!(
            naming.topic(CMD_CREDIT_RESERVE),
            "projects/saga-project/topics/commands.credit.reserve"
        );
    }

    #[test]
    fn subscription_names_follow_convention() {
        let naming = Naming::new("saga-project");
        assert_eq!(
            naming.subscription("orchestrator", EVT_CREDIT_RESERVED),
            "projects/saga-project/subscriptions/orchestrator-credit-reserved-sub"
        );
        assert_eq!(
            naming.subscription("payment", CMD_PAYMENT_GENERATE_CODE),
            "projects/saga-project/subscriptions/payment-payment-generate_code-sub"
        );
    }

    #[test]
    fn topic_lists_cover_the_protocol() {
        assert_eq!(COMMAND_TOPICS.len(), 7);
        assert_eq!(EVENT_TOPICS.len(), 12);
    }
}
