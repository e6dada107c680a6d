use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    attachment::{self, OutboundReply},
    commands::{CommandRouter, IssueReportService, NoopIssueReportService, SlashCommandPayload},
};

/// One Socket Mode envelope, decoded to the closed event union.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocketEnvelope {
    pub envelope_id: String,
    pub event: InboundEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    SlashCommand(SlashCommandPayload),
    Callback(CallbackEvent),
    Unsupported { envelope_type: String },
}

/// Inner `event_callback` events. Tags the bot is not subscribed to decode
/// as [`CallbackEvent::Other`] and resolve to silence, not an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    AppMention(AppMentionEvent),
    Other { event_type: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct AppMentionEvent {
    pub user: String,
    #[serde(default)]
    pub text: String,
    pub channel: String,
}

impl InboundEvent {
    pub fn kind(&self) -> InboundEventKind {
        match self {
            Self::SlashCommand(_) => InboundEventKind::SlashCommand,
            Self::Callback(CallbackEvent::AppMention(_)) => InboundEventKind::AppMention,
            Self::Callback(CallbackEvent::Other { .. }) => InboundEventKind::OtherCallback,
            Self::Unsupported { .. } => InboundEventKind::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InboundEventKind {
    SlashCommand,
    AppMention,
    OtherCallback,
    Unsupported,
}

#[derive(Debug, Error)]
pub enum EnvelopeParseError {
    #[error("socket frame is not a valid envelope: {source}")]
    Frame {
        #[from]
        source: serde_json::Error,
    },
    #[error("`{envelope_type}` payload did not match its schema: {source}")]
    Payload { envelope_type: &'static str, source: serde_json::Error },
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    envelope_id: String,
    #[serde(rename = "type")]
    envelope_type: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCallbackPayload {
    #[serde(rename = "type")]
    payload_type: String,
    #[serde(default)]
    event: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawInnerEvent {
    #[serde(rename = "type")]
    event_type: String,
}

/// Decodes one delivered socket frame into the envelope model.
///
/// Unrecognized envelope categories decode successfully as
/// [`InboundEvent::Unsupported`]; only a malformed frame is an error.
pub fn parse_envelope(raw: &str) -> Result<SocketEnvelope, EnvelopeParseError> {
    let frame: RawEnvelope = serde_json::from_str(raw)?;
    let event = match frame.envelope_type.as_str() {
        "slash_commands" => {
            let payload: SlashCommandPayload =
                serde_json::from_value(frame.payload).map_err(|source| {
                    EnvelopeParseError::Payload { envelope_type: "slash_commands", source }
                })?;
            InboundEvent::SlashCommand(payload)
        }
        "events_api" => {
            let payload: RawCallbackPayload =
                serde_json::from_value(frame.payload).map_err(|source| {
                    EnvelopeParseError::Payload { envelope_type: "events_api", source }
                })?;
            if payload.payload_type == "event_callback" {
                let inner = RawInnerEvent::deserialize(&payload.event).map_err(|source| {
                    EnvelopeParseError::Payload { envelope_type: "event_callback", source }
                })?;
                if inner.event_type == "app_mention" {
                    let mention: AppMentionEvent = serde_json::from_value(payload.event)
                        .map_err(|source| EnvelopeParseError::Payload {
                            envelope_type: "app_mention",
                            source,
                        })?;
                    InboundEvent::Callback(CallbackEvent::AppMention(mention))
                } else {
                    InboundEvent::Callback(CallbackEvent::Other { event_type: inner.event_type })
                }
            } else {
                InboundEvent::Unsupported {
                    envelope_type: format!("events_api/{}", payload.payload_type),
                }
            }
        }
        _ => InboundEvent::Unsupported { envelope_type: frame.envelope_type },
    };
    Ok(SocketEnvelope { envelope_id: frame.envelope_id, event })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// The handler produced a reply for the event loop to post.
    Replied(OutboundReply),
    /// The event was recognized and deliberately answered with silence.
    Handled,
    /// Nothing is bound to the event.
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("could not resolve the mentioning user `{user_id}`: {message}")]
    UserLookup { user_id: String, message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unsupported socket envelope `{envelope_type}`")]
    UnsupportedEnvelope { envelope_type: String },
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn kind(&self) -> InboundEventKind;
    async fn handle(
        &self,
        envelope: &SocketEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<InboundEventKind, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    /// Routes one envelope to the handler bound to its event kind.
    ///
    /// Unbound kinds resolve to [`HandlerResult::Ignored`]. An
    /// [`InboundEvent::Unsupported`] envelope is the one dispatch-level
    /// error; the event loop logs and skips it.
    pub async fn dispatch(
        &self,
        envelope: &SocketEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        if let InboundEvent::Unsupported { envelope_type } = &envelope.event {
            return Err(DispatchError::UnsupportedEnvelope {
                envelope_type: envelope_type.clone(),
            });
        }

        let Some(handler) = self.handlers.get(&envelope.event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(NoopIssueReportService));
    dispatcher.register(AppMentionHandler::new(NoopUserInfoSource));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: IssueReportService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: IssueReportService + 'static,
{
    fn kind(&self) -> InboundEventKind {
        InboundEventKind::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SocketEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(match self.router.route(payload).await {
            Some(reply) => HandlerResult::Replied(reply),
            None => HandlerResult::Handled,
        })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("user info lookup failed: {0}")]
pub struct UserInfoError(pub String);

/// Resolves a Slack user id to the display name used in replies.
#[async_trait]
pub trait UserInfoSource: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<String, UserInfoError>;
}

/// Falls back to the raw user id when no Web API client is attached.
#[derive(Default)]
pub struct NoopUserInfoSource;

#[async_trait]
impl UserInfoSource for NoopUserInfoSource {
    async fn display_name(&self, user_id: &str) -> Result<String, UserInfoError> {
        Ok(user_id.to_owned())
    }
}

pub struct AppMentionHandler<U> {
    users: U,
}

impl<U> AppMentionHandler<U>
where
    U: UserInfoSource,
{
    pub fn new(users: U) -> Self {
        Self { users }
    }
}

#[async_trait]
impl<U> EventHandler for AppMentionHandler<U>
where
    U: UserInfoSource + 'static,
{
    fn kind(&self) -> InboundEventKind {
        InboundEventKind::AppMention
    }

    async fn handle(
        &self,
        envelope: &SocketEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let InboundEvent::Callback(CallbackEvent::AppMention(mention)) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let user_name =
            self.users.display_name(&mention.user).await.map_err(|error| {
                EventHandlerError::UserLookup {
                    user_id: mention.user.clone(),
                    message: error.to_string(),
                }
            })?;
        let attachment = if mention.text.to_lowercase().contains("hello") {
            attachment::greeting_message(&user_name)
        } else {
            attachment::mention_prompt_message(&user_name)
        };
        Ok(HandlerResult::Replied(OutboundReply::attachment(mention.channel.clone(), attachment)))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::attachment::{AccentColor, MessageBody};
    use crate::commands::SlashCommandPayload;

    use super::{
        default_dispatcher, parse_envelope, AppMentionEvent, AppMentionHandler, CallbackEvent,
        DispatchError, EventContext, EventDispatcher, EventHandler, EventHandlerError,
        HandlerResult, InboundEvent, InboundEventKind, SocketEnvelope, UserInfoError,
        UserInfoSource,
    };

    struct StaticUsers;

    #[async_trait]
    impl UserInfoSource for StaticUsers {
        async fn display_name(&self, user_id: &str) -> Result<String, UserInfoError> {
            match user_id {
                "U123" => Ok("jdoe".to_owned()),
                other => Err(UserInfoError(format!("no such user `{other}`"))),
            }
        }
    }

    fn mention_envelope(user: &str, text: &str) -> SocketEnvelope {
        SocketEnvelope {
            envelope_id: "env-mention".to_owned(),
            event: InboundEvent::Callback(CallbackEvent::AppMention(AppMentionEvent {
                user: user.to_owned(),
                text: text.to_owned(),
                channel: "C123".to_owned(),
            })),
        }
    }

    fn slash_envelope(command: &str) -> SocketEnvelope {
        SocketEnvelope {
            envelope_id: "env-slash".to_owned(),
            event: InboundEvent::SlashCommand(SlashCommandPayload {
                command: command.to_owned(),
                text: String::new(),
                channel_id: "C123".to_owned(),
                user_id: "U123".to_owned(),
                user_name: "jdoe".to_owned(),
            }),
        }
    }

    fn attachments_of(result: HandlerResult) -> Vec<crate::attachment::Attachment> {
        let HandlerResult::Replied(reply) = result else {
            panic!("expected a reply");
        };
        let MessageBody::Attachments(attachments) = reply.body else {
            panic!("expected an attachment reply");
        };
        attachments
    }

    #[test]
    fn slash_command_envelope_decodes_to_its_payload() {
        let raw = r#"{
            "envelope_id": "env-1",
            "type": "slash_commands",
            "payload": {
                "command": "/issues",
                "text": "",
                "channel_id": "C123",
                "user_id": "U123",
                "user_name": "jdoe"
            }
        }"#;

        let envelope = parse_envelope(raw).expect("parse");

        assert_eq!(envelope.envelope_id, "env-1");
        assert_eq!(
            envelope.event,
            InboundEvent::SlashCommand(SlashCommandPayload {
                command: "/issues".to_owned(),
                text: String::new(),
                channel_id: "C123".to_owned(),
                user_id: "U123".to_owned(),
                user_name: "jdoe".to_owned(),
            })
        );
    }

    #[test]
    fn app_mention_envelope_decodes_to_the_inner_event() {
        let raw = r#"{
            "envelope_id": "env-2",
            "type": "events_api",
            "payload": {
                "type": "event_callback",
                "event": {
                    "type": "app_mention",
                    "user": "U123",
                    "text": "<@UBOT> hello",
                    "channel": "C123"
                }
            }
        }"#;

        let envelope = parse_envelope(raw).expect("parse");

        assert_eq!(
            envelope.event,
            InboundEvent::Callback(CallbackEvent::AppMention(AppMentionEvent {
                user: "U123".to_owned(),
                text: "<@UBOT> hello".to_owned(),
                channel: "C123".to_owned(),
            }))
        );
        assert_eq!(envelope.event.kind(), InboundEventKind::AppMention);
    }

    #[test]
    fn foreign_inner_events_decode_as_silent_callbacks() {
        let raw = r#"{
            "envelope_id": "env-3",
            "type": "events_api",
            "payload": {
                "type": "event_callback",
                "event": { "type": "reaction_added", "user": "U123" }
            }
        }"#;

        let envelope = parse_envelope(raw).expect("parse");

        assert_eq!(
            envelope.event,
            InboundEvent::Callback(CallbackEvent::Other { event_type: "reaction_added".to_owned() })
        );
    }

    #[test]
    fn non_callback_events_api_payload_is_unsupported() {
        let raw = r#"{
            "envelope_id": "env-4",
            "type": "events_api",
            "payload": { "type": "url_verification" }
        }"#;

        let envelope = parse_envelope(raw).expect("parse");

        assert_eq!(
            envelope.event,
            InboundEvent::Unsupported { envelope_type: "events_api/url_verification".to_owned() }
        );
    }

    #[test]
    fn unrecognized_envelope_category_is_unsupported() {
        let raw = r#"{ "envelope_id": "env-5", "type": "interactive", "payload": {} }"#;

        let envelope = parse_envelope(raw).expect("parse");

        assert_eq!(
            envelope.event,
            InboundEvent::Unsupported { envelope_type: "interactive".to_owned() }
        );
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let raw =
            r#"{ "envelope_id": "env-6", "type": "slash_commands", "payload": { "command": 7 } }"#;

        assert!(parse_envelope(raw).is_err());
    }

    #[tokio::test]
    async fn dispatching_unsupported_envelope_is_a_typed_error() {
        let dispatcher = default_dispatcher();
        let envelope = SocketEnvelope {
            envelope_id: "env-7".to_owned(),
            event: InboundEvent::Unsupported { envelope_type: "interactive".to_owned() },
        };

        let result = dispatcher.dispatch(&envelope, &EventContext::default()).await;

        assert!(matches!(
            result,
            Err(DispatchError::UnsupportedEnvelope { envelope_type }) if envelope_type == "interactive"
        ));
    }

    #[tokio::test]
    async fn dispatch_without_registration_is_ignored() {
        let dispatcher = EventDispatcher::new();

        let result = dispatcher
            .dispatch(&mention_envelope("U123", "hello"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn default_dispatcher_binds_both_handler_kinds() {
        let dispatcher = default_dispatcher();
        assert_eq!(dispatcher.handler_count(), 2);

        let result = dispatcher
            .dispatch(&slash_envelope("/help"), &EventContext::default())
            .await
            .expect("dispatch");
        assert!(matches!(result, HandlerResult::Replied(_)));
    }

    #[tokio::test]
    async fn reserved_slash_verbs_resolve_to_silent_success() {
        let dispatcher = default_dispatcher();

        let result = dispatcher
            .dispatch(&slash_envelope("/daily-report"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Handled);
    }

    #[tokio::test]
    async fn hello_mention_replies_with_the_positive_greeting() {
        let handler = AppMentionHandler::new(StaticUsers);

        let result = handler
            .handle(&mention_envelope("U123", "<@UBOT> hello there"), &EventContext::default())
            .await
            .expect("handle");

        let attachments = attachments_of(result);
        assert_eq!(attachments[0].text, "Hello jdoe");
        assert_eq!(attachments[0].color, AccentColor::Positive);
        assert_eq!(attachments[0].fields[1].title, "Initializer");
    }

    #[tokio::test]
    async fn greeting_match_is_case_insensitive() {
        let handler = AppMentionHandler::new(StaticUsers);

        let result = handler
            .handle(&mention_envelope("U123", "<@UBOT> HELLO"), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(attachments_of(result)[0].text, "Hello jdoe");
    }

    #[tokio::test]
    async fn other_mentions_ask_how_to_help() {
        let handler = AppMentionHandler::new(StaticUsers);

        let result = handler
            .handle(&mention_envelope("U123", "<@UBOT> what now?"), &EventContext::default())
            .await
            .expect("handle");

        let attachments = attachments_of(result);
        assert_eq!(attachments[0].text, "How can I help you @jdoe?");
        assert_eq!(attachments[0].color, AccentColor::Neutral);
    }

    #[tokio::test]
    async fn failed_user_lookup_surfaces_as_a_handler_error() {
        let handler = AppMentionHandler::new(StaticUsers);

        let result =
            handler.handle(&mention_envelope("U999", "hello"), &EventContext::default()).await;

        assert!(matches!(
            result,
            Err(EventHandlerError::UserLookup { user_id, .. }) if user_id == "U999"
        ));
    }

    #[tokio::test]
    async fn handlers_ignore_foreign_event_shapes() {
        let handler = AppMentionHandler::new(StaticUsers);

        let result = handler
            .handle(&slash_envelope("/help"), &EventContext::default())
            .await
            .expect("handle");

        assert_eq!(result, HandlerResult::Ignored);
    }
}
