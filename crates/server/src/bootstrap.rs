use std::sync::Arc;
use std::time::Duration;

use redbridge_core::config::{AppConfig, ConfigError, LoadOptions};
use redbridge_redmine::{RedmineClient, RedmineError};
use redbridge_slack::api::{BotIdentity, SlackApiClient, SlackApiError, DEFAULT_API_BASE};
use redbridge_slack::events::{AppMentionHandler, EventDispatcher, SlashCommandHandler};
use redbridge_slack::socket::SocketModeRunner;
use redbridge_slack::transport::SocketModeTransport;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

use crate::handlers::TrackerReportService;

pub struct Application {
    pub config: AppConfig,
    pub identity: BotIdentity,
    pub connectivity: watch::Receiver<bool>,
    pub shutdown: watch::Sender<bool>,
    pub slack_runner: SocketModeRunner,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tracker client construction failed: {0}")]
    Tracker(#[source] RedmineError),
    #[error("slack web api client construction failed: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("slack credential probe failed: {0}")]
    Credentials(#[source] SlackApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    wire_application(config, DEFAULT_API_BASE).await
}

async fn wire_application(
    config: AppConfig,
    slack_api_base: &str,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let tracker = RedmineClient::new(
        config.redmine.base_url.as_str(),
        &config.redmine.api_key,
        Duration::from_secs(config.redmine.timeout_secs),
    )
    .map_err(BootstrapError::Tracker)?;

    let slack_timeout = Duration::from_secs(config.slack.timeout_secs);
    let slack_api = SlackApiClient::new(slack_api_base, &config.slack.bot_token, slack_timeout)
        .map_err(BootstrapError::SlackClient)?;

    // Bad bot credentials surface here, before the socket ever opens.
    let identity = slack_api.auth_test().await.map_err(BootstrapError::Credentials)?;
    info!(
        event_name = "system.bootstrap.slack_authenticated",
        correlation_id = "bootstrap",
        bot_user = %identity.user,
        team = %identity.team,
        "slack credentials verified"
    );

    let transport =
        SocketModeTransport::new(slack_api_base, config.slack.app_token.clone(), slack_timeout);
    let connectivity = transport.connectivity();

    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(TrackerReportService::new(tracker)));
    dispatcher.register(AppMentionHandler::new(slack_api.clone()));

    let (shutdown, shutdown_watch) = watch::channel(false);
    let slack_runner = SocketModeRunner::new(
        Arc::new(transport),
        dispatcher,
        Arc::new(slack_api),
        shutdown_watch,
    );
    info!(
        event_name = "system.bootstrap.socket_wired",
        correlation_id = "bootstrap",
        "socket mode runner wired"
    );

    Ok(Application { config, identity, connectivity, shutdown, slack_runner })
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use redbridge_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use serde_json::json;

    use crate::bootstrap::{bootstrap, wire_application, BootstrapError};

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.slack.app_token = "xapp-test".to_string().into();
        config.slack.bot_token = "xoxb-test".to_string().into();
        config.redmine.base_url = "https://tracker.test".to_string();
        config.redmine.api_key = "key-test".to_string().into();
        config
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_required_slack_tokens() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_app_token: Some("invalid-token".to_string()),
                slack_bot_token: Some("xoxb-valid".to_string()),
                redmine_base_url: Some("https://tracker.test".to_string()),
                redmine_api_key: Some("key-test".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("slack.app_token"));
    }

    #[tokio::test]
    async fn bootstrap_probes_slack_credentials_before_wiring() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/auth.test").header("authorization", "Bearer xoxb-test");
            then.status(200).json_body(json!({
                "ok": true,
                "user": "redbridge",
                "team": "Example Corp"
            }));
        });

        let app = wire_application(test_config(), &server.base_url())
            .await
            .expect("bootstrap succeeds");

        auth.assert();
        assert_eq!(app.identity.user, "redbridge");
        assert_eq!(app.identity.team, "Example Corp");
        assert!(!*app.connectivity.borrow(), "socket link starts down until the runner connects");
    }

    #[tokio::test]
    async fn refused_credentials_fail_bootstrap() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth.test");
            then.status(200).json_body(json!({"ok": false, "error": "invalid_auth"}));
        });

        let error = wire_application(test_config(), &server.base_url())
            .await
            .expect_err("bootstrap fails");

        assert!(matches!(error, BootstrapError::Credentials(_)));
    }
}
