//! Compiled topic set of one integration

use contracts::{EventKind, TopicTemplates};
use topic_template::{CompiledTemplate, TemplateError};

/// One outbound template per event kind, plus the inbound command template
#[derive(Debug, Clone)]
pub struct CompiledTopics {
    outbound: [CompiledTemplate; 7],
    downlink: CompiledTemplate,
}

impl CompiledTopics {
    /// Compile and validate every template
    ///
    /// The error names the offending `topics.<field>`.
    pub fn compile(templates: &TopicTemplates) -> Result<Self, (String, TemplateError)> {
        let compile_publish = |kind: EventKind| {
            let field = field_name(kind);
            CompiledTemplate::compile(templates.for_kind(kind))
                .and_then(|t| t.validate_publish().map(|_| t))
                .map_err(|e| (format!("topics.{}", field), e))
        };

        let outbound = [
            compile_publish(EventKind::Uplink)?,
            compile_publish(EventKind::Join)?,
            compile_publish(EventKind::Ack)?,
            compile_publish(EventKind::Error)?,
            compile_publish(EventKind::Status)?,
            compile_publish(EventKind::Location)?,
            compile_publish(EventKind::TxAck)?,
        ];

        let downlink = CompiledTemplate::compile(&templates.downlink)
            .and_then(|t| t.validate_subscription().map(|_| t))
            .map_err(|e| ("topics.downlink".to_string(), e))?;

        Ok(Self { outbound, downlink })
    }

    pub fn for_kind(&self, kind: EventKind) -> &CompiledTemplate {
        &self.outbound[index(kind)]
    }

    pub fn downlink(&self) -> &CompiledTemplate {
        &self.downlink
    }
}

fn index(kind: EventKind) -> usize {
    match kind {
        EventKind::Uplink => 0,
        EventKind::Join => 1,
        EventKind::Ack => 2,
        EventKind::Error => 3,
        EventKind::Status => 4,
        EventKind::Location => 5,
        EventKind::TxAck => 6,
    }
}

/// Config field holding the template for `kind`
pub fn field_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Uplink => "uplink",
        EventKind::Join => "join",
        EventKind::Ack => "ack",
        EventKind::Error => "error",
        EventKind::Status => "status",
        EventKind::Location => "location",
        EventKind::TxAck => "tx_ack",
    }
}
