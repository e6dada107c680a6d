use redbridge_redmine::Issue;

/// Web link to one tracker issue.
pub fn issue_link(base_url: &str, issue_id: u32) -> String {
    format!("{base_url}/issues/{issue_id}")
}

/// One report line. The trailing space before the newline and the one
/// decimal place on both hour figures are part of the format.
pub fn issue_line(base_url: &str, issue: &Issue) -> String {
    format!(
        "<{}|#{}: {}> ({:.1}h/{:.1}h) \n",
        issue_link(base_url, issue.id),
        issue.id,
        issue.subject,
        issue.estimated_hours,
        issue.spent_hours
    )
}

/// Full assigned-issue report: header, divider, one line per issue in
/// listing order. An empty listing renders the header alone.
pub fn render_issue_report(base_url: &str, user_name: &str, issues: &[Issue]) -> String {
    let mut report = format!("Issues assigned to <@{user_name}> \n-----------\n");
    for issue in issues {
        report.push_str(&issue_line(base_url, issue));
    }
    report
}
