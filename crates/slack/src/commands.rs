use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::attachment::{self, OutboundReply};
use crate::report;

/// Slash invocation exactly as the socket envelope payload supplies it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BotCommand {
    Help,
    Issues,
    ActiveIssues,
    DailyReport,
    Unknown { verb: String },
}

/// Exact match on the verb; anything unrecognized is kept for the apology.
pub fn classify_command(verb: &str) -> BotCommand {
    match verb {
        "/help" => BotCommand::Help,
        "/issues" => BotCommand::Issues,
        "/active-issues" => BotCommand::ActiveIssues,
        "/daily-report" => BotCommand::DailyReport,
        other => BotCommand::Unknown { verb: other.to_owned() },
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum IssueReportError {
    #[error("tracker lookup failed: {0}")]
    Tracker(String),
}

/// Produces the plain-text assigned-issue report for one requester.
#[async_trait]
pub trait IssueReportService: Send + Sync {
    async fn assigned_issue_report(&self, user_name: &str) -> Result<String, IssueReportError>;
}

#[derive(Default)]
pub struct NoopIssueReportService;

#[async_trait]
impl IssueReportService for NoopIssueReportService {
    async fn assigned_issue_report(&self, user_name: &str) -> Result<String, IssueReportError> {
        Ok(report::render_issue_report("https://tracker.invalid", user_name, &[]))
    }
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: IssueReportService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Routes one slash invocation to its reply, if the verb produces one.
    ///
    /// Reserved verbs succeed silently, unknown verbs apologize, and a
    /// tracker failure becomes the try-again notice, so routing itself
    /// never fails.
    pub async fn route(&self, payload: &SlashCommandPayload) -> Option<OutboundReply> {
        match classify_command(&payload.command) {
            BotCommand::Help => Some(OutboundReply::attachment(
                payload.channel_id.clone(),
                attachment::help_message(&payload.user_name),
            )),
            BotCommand::Issues => Some(self.issue_report_reply(payload).await),
            BotCommand::ActiveIssues | BotCommand::DailyReport => None,
            BotCommand::Unknown { .. } => Some(OutboundReply::attachment(
                payload.channel_id.clone(),
                attachment::unknown_command_message(&payload.user_name),
            )),
        }
    }

    async fn issue_report_reply(&self, payload: &SlashCommandPayload) -> OutboundReply {
        match self.service.assigned_issue_report(&payload.user_name).await {
            Ok(report) => OutboundReply::text(payload.channel_id.clone(), report),
            Err(error) => {
                warn!(
                    event_name = "command.issue_report_failed",
                    user_name = %payload.user_name,
                    error = %error,
                    "issue report lookup failed; sending the try-again notice"
                );
                OutboundReply::attachment(
                    payload.channel_id.clone(),
                    attachment::tracker_unavailable_message(&payload.user_name),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::attachment::{AccentColor, MessageBody};

    use super::{
        classify_command, BotCommand, CommandRouter, IssueReportError, IssueReportService,
        SlashCommandPayload,
    };

    #[derive(Default)]
    struct RecordingService {
        requests: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl IssueReportService for RecordingService {
        async fn assigned_issue_report(&self, user_name: &str) -> Result<String, IssueReportError> {
            self.requests.lock().expect("requests lock").push(user_name.to_owned());
            if self.fail {
                return Err(IssueReportError::Tracker("connection refused".to_owned()));
            }
            Ok(format!("report for {user_name}"))
        }
    }

    fn payload(command: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: String::new(),
            channel_id: "C123".to_owned(),
            user_id: "U123".to_owned(),
            user_name: "jdoe".to_owned(),
        }
    }

    #[test]
    fn classification_matches_verbs_exactly() {
        assert_eq!(classify_command("/help"), BotCommand::Help);
        assert_eq!(classify_command("/issues"), BotCommand::Issues);
        assert_eq!(classify_command("/active-issues"), BotCommand::ActiveIssues);
        assert_eq!(classify_command("/daily-report"), BotCommand::DailyReport);
        assert_eq!(classify_command("/ISSUES"), BotCommand::Unknown { verb: "/ISSUES".to_owned() });
    }

    #[tokio::test]
    async fn help_reply_is_a_neutral_attachment_naming_issues() {
        let router = CommandRouter::new(RecordingService::default());

        let reply = router.route(&payload("/help")).await.expect("help reply");

        assert_eq!(reply.channel, "C123");
        let MessageBody::Attachments(attachments) = reply.body else {
            panic!("expected an attachment reply");
        };
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].color, AccentColor::Neutral);
        assert!(attachments[0].text.contains("/issues"));
    }

    #[tokio::test]
    async fn issues_reply_is_the_service_report_as_plain_text() {
        let router = CommandRouter::new(RecordingService::default());

        let reply = router.route(&payload("/issues")).await.expect("issues reply");

        assert_eq!(reply.body, MessageBody::Text("report for jdoe".to_owned()));
        let requests = router.service.requests.lock().expect("requests lock");
        assert_eq!(&*requests, &["jdoe"]);
    }

    #[tokio::test]
    async fn tracker_failure_becomes_the_try_again_reply() {
        let router = CommandRouter::new(RecordingService { fail: true, ..Default::default() });

        let reply = router.route(&payload("/issues")).await.expect("failure reply");

        let MessageBody::Attachments(attachments) = reply.body else {
            panic!("expected an attachment reply");
        };
        assert_eq!(
            attachments[0].text,
            "Sorry jdoe, I could not reach the tracker. Please try again later."
        );
        assert_eq!(attachments[0].color, AccentColor::Neutral);
    }

    #[tokio::test]
    async fn reserved_verbs_succeed_silently_without_service_calls() {
        let router = CommandRouter::new(RecordingService::default());

        assert!(router.route(&payload("/active-issues")).await.is_none());
        assert!(router.route(&payload("/daily-report")).await.is_none());
        assert!(router.service.requests.lock().expect("requests lock").is_empty());
    }

    #[tokio::test]
    async fn unknown_verbs_apologize_instead_of_failing() {
        let router = CommandRouter::new(RecordingService::default());

        let reply = router.route(&payload("/deploy")).await.expect("apology reply");

        let MessageBody::Attachments(attachments) = reply.body else {
            panic!("expected an attachment reply");
        };
        assert_eq!(attachments[0].text, "Hello! jdoe\n Sorry, but I can't do that");
    }
}
