use chrono::Utc;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum AccentColor {
    #[serde(rename = "#4af030")]
    Positive,
    #[serde(rename = "#3d3d3d")]
    Neutral,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
}

impl AttachmentField {
    pub fn new(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self { title: title.into(), value: value.into() }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: AccentColor,
    pub fields: Vec<AttachmentField>,
}

/// Body of an outbound chat message: the issue report goes out as plain
/// text, everything else as a single accented attachment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageBody {
    Text(String),
    Attachments(Vec<Attachment>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutboundReply {
    pub channel: String,
    pub body: MessageBody,
}

impl OutboundReply {
    pub fn text(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self { channel: channel.into(), body: MessageBody::Text(body.into()) }
    }

    pub fn attachment(channel: impl Into<String>, attachment: Attachment) -> Self {
        Self { channel: channel.into(), body: MessageBody::Attachments(vec![attachment]) }
    }
}

// Mention replies stamp `Initializer`, slash replies `Initiator`; the
// divergent spelling is intentional.
const MENTION_AUDIT_TITLE: &str = "Initializer";
const COMMAND_AUDIT_TITLE: &str = "Initiator";

fn audit_fields(audit_title: &str, user_name: &str) -> Vec<AttachmentField> {
    vec![
        AttachmentField::new("Date", Utc::now().to_rfc3339()),
        AttachmentField::new(audit_title, user_name),
    ]
}

pub fn greeting_message(user_name: &str) -> Attachment {
    Attachment {
        text: format!("Hello {user_name}"),
        color: AccentColor::Positive,
        fields: audit_fields(MENTION_AUDIT_TITLE, user_name),
    }
}

pub fn mention_prompt_message(user_name: &str) -> Attachment {
    Attachment {
        text: format!("How can I help you @{user_name}?"),
        color: AccentColor::Neutral,
        fields: audit_fields(MENTION_AUDIT_TITLE, user_name),
    }
}

pub fn help_message(user_name: &str) -> Attachment {
    Attachment {
        text: format!("Hello! {user_name}\n I can show you all your tickets with command /issues"),
        color: AccentColor::Neutral,
        fields: audit_fields(COMMAND_AUDIT_TITLE, user_name),
    }
}

pub fn unknown_command_message(user_name: &str) -> Attachment {
    Attachment {
        text: format!("Hello! {user_name}\n Sorry, but I can't do that"),
        color: AccentColor::Neutral,
        fields: audit_fields(COMMAND_AUDIT_TITLE, user_name),
    }
}

pub fn tracker_unavailable_message(user_name: &str) -> Attachment {
    Attachment {
        text: format!("Sorry {user_name}, I could not reach the tracker. Please try again later."),
        color: AccentColor::Neutral,
        fields: audit_fields(COMMAND_AUDIT_TITLE, user_name),
    }
}
