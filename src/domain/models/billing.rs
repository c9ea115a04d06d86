use std::collections::HashMap;

use serde::Deserialize;

/// Payment-processor webhook envelope. The event vocabulary is matched by
/// name in the billing handler; unknown types are acknowledged unprocessed.
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: BillingEventData,
}

#[derive(Debug, Deserialize)]
pub struct BillingEventData {
    pub object: BillingObject,
}

/// Subscription or invoice object carried by the event. For subscription
/// events `id` is the subscription id; for invoice events the subscription
/// reference lives in `subscription`.
#[derive(Debug, Deserialize)]
pub struct BillingObject {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl BillingObject {
    pub fn tenant_id(&self) -> Option<&str> {
        self.metadata.get("tenant_id").map(|s| s.as_str())
    }
}

impl BillingEvent {
    /// The subscription reference, when the event genuinely carries one:
    /// the object id for subscription events, the `subscription` field for
    /// everything else. An invoice id must never stand in for a
    /// subscription id.
    pub fn subscription_ref(&self) -> Option<&str> {
        if self.kind.starts_with("customer.subscription.") {
            Some(self.data.object.id.as_str())
        } else {
            self.data.object.subscription.as_deref()
        }
    }
}
