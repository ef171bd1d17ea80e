//! Event payloads carried by verified webhook deliveries.

// self
use crate::_prelude::*;

/// Subscription type emitted when a contact is created.
pub const CONTACT_CREATION: &str = "contact.creation";

/// Body could not be decoded into events.
#[derive(Debug, ThisError)]
#[error("Webhook body is not a valid event array.")]
pub struct EventParseError {
	/// Structured parsing failure, including the JSON path.
	#[source]
	pub source: serde_path_to_error::Error<serde_json::Error>,
}
impl EventParseError {
	/// Returns the JSON path where decoding failed.
	pub fn path(&self) -> String {
		self.source.path().to_string()
	}
}

/// One entry of a webhook delivery. Unknown fields are ignored and absent ones stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
	/// Identifier of the CRM object the event refers to.
	pub object_id: Option<i64>,
	/// Subscription that fired, e.g. `contact.creation`.
	pub subscription_type: Option<String>,
	/// Event identifier.
	pub event_id: Option<i64>,
	/// Account (portal) that owns the object.
	pub portal_id: Option<i64>,
	/// Milliseconds since the Unix epoch at which the change happened.
	pub occurred_at: Option<i64>,
	/// Changed property, for property-change subscriptions.
	pub property_name: Option<String>,
	/// New property value, for property-change subscriptions.
	pub property_value: Option<String>,
}
impl WebhookEvent {
	/// Returns `true` for contact-creation events, ignoring ASCII case.
	pub fn is_contact_creation(&self) -> bool {
		self.subscription_type
			.as_deref()
			.is_some_and(|kind| kind.eq_ignore_ascii_case(CONTACT_CREATION))
	}
}

/// Decodes a verified body into its events.
///
/// Call this only after the signature has been verified.
pub fn parse_events(body: &[u8]) -> Result<Vec<WebhookEvent>, EventParseError> {
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de).map_err(|source| EventParseError { source })
}
