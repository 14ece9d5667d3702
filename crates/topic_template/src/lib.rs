//! # Topic Template
//!
//! Destination templates compiled once at integration startup.
//!
//! Placeholders:
//! - `{appID}` / `{applicationID}`: application id, decimal
//! - `{devEUI}`: device EUI, 16 lowercase hex characters
//! - legacy `{{ .ApplicationID }}` / `{{ .DevEUI }}`, whitespace inside the braces is ignored
//!
//! Rendering is a pure function of (template, application id, dev EUI) and never fails.

use contracts::DevEui;
use std::fmt::{self, Write as _};
use thiserror::Error;

/// Template parse / validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("template is empty")]
    Empty,

    /// Opening brace without a matching close
    #[error("unterminated placeholder at byte {position}")]
    Unterminated { position: usize },

    #[error("unknown placeholder '{0}'")]
    UnknownPlaceholder(String),

    /// Template cannot be used as an inbound subscription
    #[error("invalid subscription template: {0}")]
    InvalidSubscription(String),

    /// Publish topics must be concrete
    #[error("publish template '{0}' contains an MQTT wildcard")]
    WildcardInPublish(String),
}

/// Identifier a placeholder stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    ApplicationId,
    DevEui,
}

impl Placeholder {
    /// Name inside `{...}`, taken verbatim
    fn parse_short(name: &str) -> Result<Self, TemplateError> {
        match name {
            "appID" | "applicationID" => Ok(Placeholder::ApplicationId),
            "devEUI" => Ok(Placeholder::DevEui),
            other => Err(TemplateError::UnknownPlaceholder(other.to_string())),
        }
    }

    /// Name inside `{{ ... }}`, surrounding whitespace already trimmed
    fn parse_legacy(name: &str) -> Result<Self, TemplateError> {
        match name {
            ".ApplicationID" => Ok(Placeholder::ApplicationId),
            ".DevEUI" => Ok(Placeholder::DevEui),
            other => Err(TemplateError::UnknownPlaceholder(other.to_string())),
        }
    }

    /// Upper bound of the rendered width
    fn max_len(&self) -> usize {
        match self {
            Placeholder::ApplicationId => 20,
            Placeholder::DevEui => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value(Placeholder),
}

/// Identifiers extracted from a concrete topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicMatch {
    /// `None` when the template has no application placeholder
    pub application_id: Option<u64>,
    pub dev_eui: DevEui,
}

/// Pre-split template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    source: String,
    segments: Vec<Segment>,
    capacity: usize,
}

impl CompiledTemplate {
    /// Parse `template` into literal and placeholder segments
    pub fn compile(template: &str) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;
        let mut offset = 0;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let position = offset + open;
            let after = &rest[open..];

            let (placeholder, consumed) = if let Some(inner) = after.strip_prefix("{{") {
                let close = inner
                    .find("}}")
                    .ok_or(TemplateError::Unterminated { position })?;
                (Placeholder::parse_legacy(inner[..close].trim())?, close + 4)
            } else {
                let inner = &after[1..];
                let close = inner
                    .find('}')
                    .ok_or(TemplateError::Unterminated { position })?;
                (Placeholder::parse_short(&inner[..close])?, close + 2)
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Value(placeholder));

            rest = &after[consumed..];
            offset = position + consumed;
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let capacity = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.len(),
                Segment::Value(p) => p.max_len(),
            })
            .sum();

        Ok(Self {
            source: template.to_string(),
            segments,
            capacity,
        })
    }

    /// Original template text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn has_placeholder(&self, placeholder: Placeholder) -> bool {
        self.segments
            .iter()
            .any(|s| *s == Segment::Value(placeholder))
    }

    /// Concrete topic for a device
    pub fn render(&self, application_id: u64, dev_eui: &DevEui) -> String {
        let mut out = String::with_capacity(self.capacity);
        for segment in &self.segments {
            // writing into a String cannot fail
            let _ = match segment {
                Segment::Literal(l) => out.write_str(l),
                Segment::Value(Placeholder::ApplicationId) => write!(out, "{}", application_id),
                Segment::Value(Placeholder::DevEui) => write!(out, "{}", dev_eui),
            };
        }
        out
    }

    /// Template with every placeholder replaced by the single-level wildcard `+`
    pub fn subscription_pattern(&self) -> String {
        let mut out = String::with_capacity(self.capacity);
        for segment in &self.segments {
            match segment {
                Segment::Literal(l) => out.push_str(l),
                Segment::Value(_) => out.push('+'),
            }
        }
        out
    }

    /// Publish templates must not contain `+` or `#`
    pub fn validate_publish(&self) -> Result<(), TemplateError> {
        let has_wildcard = self.segments.iter().any(|s| match s {
            Segment::Literal(l) => l.contains(['+', '#']),
            Segment::Value(_) => false,
        });

        if has_wildcard {
            return Err(TemplateError::WildcardInPublish(self.source.clone()));
        }
        Ok(())
    }

    /// Subscription templates need a `{devEUI}` placeholder and every placeholder
    /// must fill a whole topic level
    pub fn validate_subscription(&self) -> Result<(), TemplateError> {
        if !self.has_placeholder(Placeholder::DevEui) {
            return Err(TemplateError::InvalidSubscription(format!(
                "'{}' has no devEUI placeholder",
                self.source
            )));
        }

        for level in self.levels() {
            match level {
                Level::Mixed => {
                    return Err(TemplateError::InvalidSubscription(format!(
                        "'{}' has a placeholder sharing a topic level with text",
                        self.source
                    )));
                }
                Level::Literal(l) if l.contains(['+', '#']) => {
                    return Err(TemplateError::InvalidSubscription(format!(
                        "'{}' contains an MQTT wildcard",
                        self.source
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Extract identifiers from a concrete topic
    ///
    /// Returns `None` when the topic does not fit the template or an identifier
    /// does not parse. A placeholder used twice must carry the same value.
    pub fn match_topic(&self, topic: &str) -> Option<TopicMatch> {
        let levels = self.levels();
        let parts: Vec<&str> = topic.split('/').collect();
        if levels.len() != parts.len() {
            return None;
        }

        let mut application_id = None;
        let mut dev_eui = None;

        for (level, part) in levels.iter().zip(parts) {
            match level {
                Level::Literal(l) => {
                    if *l != part {
                        return None;
                    }
                }
                Level::Value(Placeholder::ApplicationId) => {
                    let id: u64 = part.parse().ok()?;
                    if application_id.is_some_and(|prev| prev != id) {
                        return None;
                    }
                    application_id = Some(id);
                }
                Level::Value(Placeholder::DevEui) => {
                    let eui: DevEui = part.parse().ok()?;
                    if dev_eui.is_some_and(|prev| prev != eui) {
                        return None;
                    }
                    dev_eui = Some(eui);
                }
                Level::Mixed => return None,
            }
        }

        Some(TopicMatch {
            application_id,
            dev_eui: dev_eui?,
        })
    }

    fn levels(&self) -> Vec<Level<'_>> {
        let mut levels = Vec::new();
        let mut current: Option<Level<'_>> = None;

        for segment in &self.segments {
            match segment {
                Segment::Value(p) => join_level(&mut current, Level::Value(*p)),
                Segment::Literal(l) => {
                    let mut pieces = l.split('/');
                    if let Some(first) = pieces.next() {
                        if !first.is_empty() {
                            join_level(&mut current, Level::Literal(first));
                        }
                    }
                    for piece in pieces {
                        levels.push(current.take().unwrap_or(Level::Literal("")));
                        if !piece.is_empty() {
                            current = Some(Level::Literal(piece));
                        }
                    }
                }
            }
        }
        levels.push(current.unwrap_or(Level::Literal("")));
        levels
    }
}

fn join_level<'a>(current: &mut Option<Level<'a>>, piece: Level<'a>) {
    *current = Some(match current.take() {
        None => piece,
        Some(_) => Level::Mixed,
    });
}

/// One `/`-separated topic level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level<'a> {
    Literal(&'a str),
    Value(Placeholder),
    /// Placeholder next to text or another placeholder
    Mixed,
}

impl fmt::Display for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for CompiledTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eui() -> DevEui {
        DevEui::new([1, 2, 3, 4, 5, 6, 7, 8])
    }

    #[test]
    fn test_render_short_placeholders() {
        let t = CompiledTemplate::compile("app/{appID}/device/{devEUI}/rx").unwrap();
        assert_eq!(t.render(123, &eui()), "app/123/device/0102030405060708/rx");
        assert_eq!(t.render(123, &eui()), t.render(123, &eui()));
    }

    #[test]
    fn test_render_legacy_placeholders() {
        let t = CompiledTemplate::compile(
            "application/{{ .ApplicationID }}/device/{{.DevEUI}}/join",
        )
        .unwrap();
        assert_eq!(
            t.render(7, &DevEui::new([0xab; 8])),
            "application/7/device/abababababababab/join"
        );
    }

    #[test]
    fn test_subscription_pattern() {
        let t = CompiledTemplate::compile("application/{applicationID}/device/{devEUI}/tx")
            .unwrap();
        assert_eq!(t.subscription_pattern(), "application/+/device/+/tx");
        assert!(t.validate_subscription().is_ok());
    }

    #[test]
    fn test_match_topic() {
        let t = CompiledTemplate::compile("application/{{ .ApplicationID }}/device/{{ .DevEUI }}/tx")
            .unwrap();

        let m = t
            .match_topic("application/42/device/0102030405060708/tx")
            .unwrap();
        assert_eq!(m.application_id, Some(42));
        assert_eq!(m.dev_eui, eui());

        // uppercase hex is accepted
        let m = t
            .match_topic("application/42/device/ABABABABABABABAB/tx")
            .unwrap();
        assert_eq!(m.dev_eui, DevEui::new([0xab; 8]));
    }

    #[test]
    fn test_match_topic_mismatch() {
        let t = CompiledTemplate::compile("application/{appID}/device/{devEUI}/tx").unwrap();

        assert!(t.match_topic("application/42/device/0102030405060708/rx").is_none());
        assert!(t.match_topic("application/42/device/0102/tx").is_none());
        assert!(t.match_topic("application/x/device/0102030405060708/tx").is_none());
        assert!(t.match_topic("application/42/device/0102030405060708/tx/extra").is_none());
    }

    #[test]
    fn test_match_without_application_placeholder() {
        let t = CompiledTemplate::compile("devices/{devEUI}/command").unwrap();
        let m = t.match_topic("devices/0102030405060708/command").unwrap();
        assert_eq!(m.application_id, None);
        assert_eq!(m.dev_eui, eui());
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(CompiledTemplate::compile(""), Err(TemplateError::Empty));
        assert_eq!(
            CompiledTemplate::compile("app/{appID"),
            Err(TemplateError::Unterminated { position: 4 })
        );
        assert_eq!(
            CompiledTemplate::compile("app/{{ .Foo }}"),
            Err(TemplateError::UnknownPlaceholder(".Foo".into()))
        );
    }

    #[test]
    fn test_mixed_delimiters_rejected() {
        for (template, name) in [
            ("app/{.DevEUI}/rx", ".DevEUI"),
            ("app/{{ devEUI }}/rx", "devEUI"),
            ("app/{{.ApplicationID}}/{ devEUI }/rx", " devEUI "),
            ("app/{{ appID }}/{devEUI}/rx", "appID"),
        ] {
            assert_eq!(
                CompiledTemplate::compile(template),
                Err(TemplateError::UnknownPlaceholder(name.into())),
                "{template}"
            );
        }
    }

    #[test]
    fn test_publish_validation() {
        let t = CompiledTemplate::compile("app/+/device/{devEUI}/rx").unwrap();
        assert!(matches!(
            t.validate_publish(),
            Err(TemplateError::WildcardInPublish(_))
        ));

        let t = CompiledTemplate::compile("app/{appID}/device/{devEUI}/rx").unwrap();
        assert!(t.validate_publish().is_ok());
    }

    #[test]
    fn test_subscription_validation() {
        let missing = CompiledTemplate::compile("app/{appID}/tx").unwrap();
        assert!(missing.validate_subscription().is_err());

        let partial = CompiledTemplate::compile("app/dev-{devEUI}/tx").unwrap();
        assert!(partial.validate_subscription().is_err());

        let wildcard = CompiledTemplate::compile("app/#/{devEUI}").unwrap();
        assert!(wildcard.validate_subscription().is_err());
    }

    #[test]
    fn test_leading_slash_levels() {
        let t = CompiledTemplate::compile("/{devEUI}/tx").unwrap();
        assert_eq!(t.subscription_pattern(), "/+/tx");
        assert!(t.match_topic("/0102030405060708/tx").is_some());
    }
}
