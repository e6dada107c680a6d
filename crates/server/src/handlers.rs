use async_trait::async_trait;
use redbridge_redmine::RedmineClient;
use redbridge_slack::commands::{IssueReportError, IssueReportService};
use redbridge_slack::report::render_issue_report;
use tracing::debug;

/// Serves `/issues` from live tracker data.
///
/// The requester's chat handle is matched against tracker logins. An
/// unknown handle is not an error; it produces the report header with an
/// empty listing, the same shape a user with no assignments sees.
pub struct TrackerReportService {
    tracker: RedmineClient,
}

impl TrackerReportService {
    pub fn new(tracker: RedmineClient) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl IssueReportService for TrackerReportService {
    async fn assigned_issue_report(&self, user_name: &str) -> Result<String, IssueReportError> {
        let assignee = self
            .tracker
            .resolve_user_id(user_name)
            .await
            .map_err(|error| IssueReportError::Tracker(error.to_string()))?;

        let issues = match assignee {
            Some(assignee_id) => self
                .tracker
                .assigned_issues(assignee_id)
                .await
                .map_err(|error| IssueReportError::Tracker(error.to_string()))?,
            None => {
                debug!(user_name = %user_name, "no tracker account matches the requester");
                Vec::new()
            }
        };

        Ok(render_issue_report(self.tracker.base_url(), user_name, &issues))
    }
}
