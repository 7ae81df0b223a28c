//! Inline reply document: the webhook response that instructs the provider to
//! deliver one message per group member.
//!
//! Building is purely in-memory — the inline path never calls the provider over
//! the network; the returned document does the delivering when the webhook
//! transport hands it back.

/// One outbound message in the reply document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub to: String,
    pub from: String,
    pub text: String,
}

/// A multi-recipient reply document (zero or more message descriptors).
#[derive(Debug, Clone, Default)]
pub struct ResponseDocument {
    messages: Vec<MessageDescriptor>,
}

impl ResponseDocument {
    /// The empty acknowledgement (deferred path, nothing to deliver inline).
    pub fn empty() -> Self {
        Self::default()
    }

    /// One descriptor per member, in member order. An empty member list yields
    /// a valid document with zero descriptors.
    pub fn build<I, S>(from: &str, text: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let messages = members
            .into_iter()
            .map(|member| MessageDescriptor {
                to: member.into(),
                from: from.to_string(),
                text: text.to_string(),
            })
            .collect();
        Self { messages }
    }

    pub fn messages(&self) -> &[MessageDescriptor] {
        &self.messages
    }

    /// Serialize to the TwiML-shaped XML the webhook transport expects.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>");
        for m in &self.messages {
            out.push_str("<Message to=\"");
            out.push_str(&escape_xml(&m.to));
            out.push_str("\" from=\"");
            out.push_str(&escape_xml(&m.from));
            out.push_str("\">");
            out.push_str(&escape_xml(&m.text));
            out.push_str("</Message>");
        }
        out.push_str("</Response>");
        out
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
