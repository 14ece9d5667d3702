//! Outbound message preparation: topic rendering + encoding

use codec::Marshaler;
use contracts::{EventKind, EventMessage, IntegrationError};
use rumqttc::QoS;
use serde::Serialize;

use crate::topics::CompiledTopics;

/// Ready-to-publish message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub kind: EventKind,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Publish-side settings of one integration
#[derive(Debug, Clone)]
pub struct Outbound {
    name: String,
    topics: CompiledTopics,
    marshaler: Marshaler,
    qos: QoS,
    retain: bool,
}

impl Outbound {
    pub fn new(
        name: impl Into<String>,
        topics: CompiledTopics,
        marshaler: Marshaler,
        qos: QoS,
        retain: bool,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            marshaler,
            qos,
            retain,
        }
    }

    pub fn topics(&self) -> &CompiledTopics {
        &self.topics
    }

    pub fn marshaler(&self) -> Marshaler {
        self.marshaler
    }

    pub fn qos(&self) -> QoS {
        self.qos
    }

    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Render the topic and encode the payload
    ///
    /// # Errors
    /// - `Delivery` when the event's devEUI is not 8 bytes
    /// - `Codec` when encoding fails
    pub fn prepare<M>(&self, event: &M) -> Result<OutboundMessage, IntegrationError>
    where
        M: EventMessage + prost::Message + Serialize,
    {
        let dev_eui = event
            .dev_eui()
            .map_err(|e| IntegrationError::delivery(&self.name, e.to_string()))?;

        let topic = self
            .topics
            .for_kind(M::KIND)
            .render(event.application_id(), &dev_eui);

        let payload = self
            .marshaler
            .encode_message(event)
            .map_err(|e| IntegrationError::codec(&self.name, e.to_string()))?;

        Ok(OutboundMessage {
            kind: M::KIND,
            topic,
            payload,
        })
    }
}
