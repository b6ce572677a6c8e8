//! Subscription management for WebSocket clients.

use std::collections::HashSet;

use docverify_types::VerificationId;
use docverify_verification::VerificationEvent;
use serde::{Deserialize, Serialize};

/// A message sent by a client.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Start (or replace) the client's subscription.
    Subscribe {
        #[serde(default)]
        filter: Option<SubscriptionFilter>,
    },
    Unsubscribe,
    Ping,
}

/// Optional filter for subscriptions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    /// Only receive events for these verifications.
    pub verification_ids: Option<HashSet<VerificationId>>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &VerificationEvent) -> bool {
        self.verification_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&event.verification_id()))
    }
}

/// A message sent to a client.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Ack { action: String },
    Event { event: VerificationEvent },
    Pong,
    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{\"type\":\"error\"}"))
    }
}

/// Per-connection subscription state.
#[derive(Debug, Default)]
pub struct ClientSubscription {
    filter: Option<SubscriptionFilter>,
}

impl ClientSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, filter: Option<SubscriptionFilter>) {
        self.filter = Some(filter.unwrap_or_default());
    }

    /// Returns `false` if the client was not subscribed.
    pub fn unsubscribe(&mut self) -> bool {
        self.filter.take().is_some()
    }

    pub fn is_subscribed(&self) -> bool {
        self.filter.is_some()
    }

    pub fn filter(&self) -> Option<&SubscriptionFilter> {
        self.filter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_types::StepName;

    fn id(b: u8) -> VerificationId {
        VerificationId::new([b; 16])
    }

    #[test]
    fn parses_subscribe_with_filter() {
        let raw = format!(
            r#"{{"action":"subscribe","filter":{{"verificationIds":["{}"]}}}}"#,
            id(1)
        );
        let msg: ClientMessage = serde_json::from_str(&raw).unwrap();
        let ClientMessage::Subscribe { filter: Some(filter) } = msg else {
            panic!("unexpected message: {msg:?}");
        };
        assert!(filter.verification_ids.unwrap().contains(&id(1)));
    }

    #[test]
    fn parses_bare_actions() {
        let msg: ClientMessage = serde_json::from_str(r#"{"action":"subscribe"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Subscribe { filter: None });
        let msg: ClientMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping);
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"dance"}"#).is_err());
    }

    #[test]
    fn filter_narrows_by_verification_id() {
        let filter = SubscriptionFilter {
            verification_ids: Some([id(1)].into_iter().collect()),
        };
        let hit = VerificationEvent::Cancelled { verification_id: id(1) };
        let miss = VerificationEvent::StepStarted {
            verification_id: id(2),
            step: StepName::OcrVerification,
        };
        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
        assert!(SubscriptionFilter::default().matches(&miss));
    }

    #[test]
    fn unsubscribe_reports_prior_state() {
        let mut sub = ClientSubscription::new();
        assert!(!sub.unsubscribe());
        sub.subscribe(None);
        assert!(sub.is_subscribed());
        assert!(sub.unsubscribe());
        assert!(!sub.is_subscribed());
    }

    #[test]
    fn event_frame_wraps_the_event() {
        let frame = ServerMessage::Event {
            event: VerificationEvent::Cancelled { verification_id: id(3) },
        }
        .to_json();
        let json: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["event"], "cancelled");
        assert_eq!(json["event"]["verificationId"], id(3).to_string());
    }
}
