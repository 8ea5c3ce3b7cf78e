//! Comment processing pipeline
//!
//! Extraction, classification, aggregation, the completeness check and label
//! reconciliation for one comment on one pull request.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CiLabelConfig;
use crate::error::BoxError;
use crate::labels::{apply_label_ops, plan_label_ops, LabelApi, LabelOp};
use crate::parser::{is_ci_comment, CiParser, ExtractError};
use crate::{Error, Result};

static CHECK_CI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^/check-ci\s*$").expect("check-ci pattern is valid")
});

/// Whether a comment asks for the CI label to be recomputed
pub fn is_check_ci_command(body: &str) -> bool {
    CHECK_CI_RE.is_match(body)
}

/// A comment on a pull request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Comment listing on the review platform
#[async_trait]
pub trait CommentSource: Send + Sync {
    /// All comments on the pull request
    async fn list_comments(&self, pr_number: u64) -> std::result::Result<Vec<Comment>, BoxError>;
}

/// The most recent CI table posted by `bot`
pub fn latest_ci_comment<'a>(comments: &'a [Comment], bot: &str, title: &str) -> Option<&'a Comment> {
    comments
        .iter()
        .filter(|c| c.author == bot && is_ci_comment(title, &c.body))
        .max_by_key(|c| c.created_at)
}

/// Outcome of processing one CI comment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CiReport {
    /// Status per classified row, in table order
    pub statuses: Vec<String>,
    /// Distinct statuses
    pub status_set: BTreeSet<String>,
    /// Rows dropped as invalid or unrecognised
    pub dropped_rows: usize,
    /// Highest-priority status across the table
    pub aggregate: Option<String>,
    /// Label the pull request should carry
    pub desired: Option<String>,
    /// Success was turned into running because jobs are missing
    pub downgraded: bool,
    /// Operations moving the applied labels to `desired`
    pub ops: Vec<LabelOp>,
}

/// Turns CI comments into label operations for one repository
#[derive(Debug, Clone)]
pub struct CiLabeler {
    parser: CiParser,
    universe: BTreeSet<String>,
    success_label: Option<String>,
    running_label: Option<String>,
}

impl CiLabeler {
    pub fn new(config: &CiLabelConfig) -> Self {
        Self {
            parser: CiParser::from_config(config),
            universe: config.label_universe(),
            success_label: config.success_label().map(str::to_string),
            running_label: config.running_label().map(str::to_string),
        }
    }

    pub fn parser(&self) -> &CiParser {
        &self.parser
    }

    /// Labels this labeler may add or remove
    pub fn universe(&self) -> &BTreeSet<String> {
        &self.universe
    }

    /// Compute the label operations for a comment
    ///
    /// A success verdict from fewer classified rows than `expected_jobs`
    /// becomes the running label, since some jobs have not reported yet.
    pub fn process_comment(
        &self,
        comment: &str,
        applied: &BTreeSet<String>,
        expected_jobs: usize,
    ) -> std::result::Result<CiReport, ExtractError> {
        let mut report = self.evaluate(comment, expected_jobs)?;
        report.ops = plan_label_ops(applied, &self.universe, report.desired.as_deref());
        Ok(report)
    }

    /// Classify a comment and pick the desired label, without planning ops
    pub fn evaluate(
        &self,
        comment: &str,
        expected_jobs: usize,
    ) -> std::result::Result<CiReport, ExtractError> {
        let table = self.parser.parse_comment(comment)?;
        let status_set = table.status_set();
        let aggregate = self.parser.aggregate(&status_set).map(str::to_string);

        let mut desired = aggregate.clone();
        let mut downgraded = false;

        if aggregate.is_some()
            && aggregate == self.success_label
            && table.statuses.len() < expected_jobs
        {
            info!(
                classified = table.statuses.len(),
                expected_jobs,
                "All reported jobs succeeded but some have not reported yet"
            );
            desired = self.running_label.clone();
            downgraded = true;
        }

        Ok(CiReport {
            statuses: table.statuses,
            status_set,
            dropped_rows: table.dropped_rows,
            aggregate,
            desired,
            downgraded,
            ops: Vec::new(),
        })
    }

    /// Process a CI comment against the labels currently on the pull request
    ///
    /// Labels are read fresh on every call. Returns `None` when the comment
    /// holds no CI table. With `dry_run` the operations are computed but not
    /// sent.
    pub async fn reconcile<A>(
        &self,
        api: &A,
        pr_number: u64,
        comment: &str,
        expected_jobs: usize,
        dry_run: bool,
    ) -> Result<Option<CiReport>>
    where
        A: LabelApi + ?Sized,
    {
        let mut report = match self.evaluate(comment, expected_jobs) {
            Ok(report) => report,
            Err(e) => {
                debug!(pr_number, error = %e, "Comment carries no CI table");
                return Ok(None);
            }
        };

        let applied: BTreeSet<String> = api
            .list_labels(pr_number)
            .await
            .map_err(Error::Platform)?
            .into_iter()
            .collect();
        report.ops = plan_label_ops(&applied, &self.universe, report.desired.as_deref());

        if dry_run {
            info!(pr_number, ops = report.ops.len(), "Dry run, not applying labels");
        } else {
            apply_label_ops(api, pr_number, &report.ops).await?;
        }

        Ok(Some(report))
    }

    /// Handle a newly created comment on a pull request
    ///
    /// A `/check-ci` command re-reads the latest CI table posted by `bot`;
    /// a CI table comment is processed directly; anything else is ignored.
    pub async fn handle_comment_event<P>(
        &self,
        platform: &P,
        pr_number: u64,
        body: &str,
        bot: &str,
        expected_jobs: usize,
        dry_run: bool,
    ) -> Result<Option<CiReport>>
    where
        P: LabelApi + CommentSource + ?Sized,
    {
        if is_check_ci_command(body) {
            return self
                .recheck(platform, pr_number, bot, expected_jobs, dry_run)
                .await;
        }

        if self.parser.is_ci_comment(body) {
            return self
                .reconcile(platform, pr_number, body, expected_jobs, dry_run)
                .await;
        }

        Ok(None)
    }

    /// Recompute the label from the latest CI table posted by `bot`
    pub async fn recheck<P>(
        &self,
        platform: &P,
        pr_number: u64,
        bot: &str,
        expected_jobs: usize,
        dry_run: bool,
    ) -> Result<Option<CiReport>>
    where
        P: LabelApi + CommentSource + ?Sized,
    {
        let comments = platform
            .list_comments(pr_number)
            .await
            .map_err(Error::Platform)?;

        let Some(latest) = latest_ci_comment(&comments, bot, self.parser.title()) else {
            debug!(pr_number, bot, "No CI comment from bot");
            return Ok(None);
        };

        debug!(pr_number, comment_id = latest.id, "Rechecking latest CI comment");
        self.reconcile(platform, pr_number, &latest.body, expected_jobs, dry_run)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusDescAndLabel;
    use crate::labels::testing::FakeLabels;
    use chrono::TimeZone;

    const TITLE: &str = "| job | result | detail |";

    fn config() -> CiLabelConfig {
        CiLabelConfig {
            title_of_ci_table: TITLE.to_string(),
            job_error_status: StatusDescAndLabel::new(["error"], "ci_error"),
            job_failure_status: StatusDescAndLabel::new(["failed"], "ci_failed"),
            job_running_status: StatusDescAndLabel::new(["running"], "ci_running"),
            job_success_status: StatusDescAndLabel::new(["success"], "ci_success"),
        }
    }

    fn table(rows: &[&str]) -> String {
        format!("{}\n| --- | --- | --- |\n{}", TITLE, rows.join("\n"))
    }

    fn set(labels: &[&str]) -> BTreeSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn comment(id: u64, author: &str, body: &str, minute: u32) -> Comment {
        Comment {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
        }
    }

    struct FakePlatform {
        labels: FakeLabels,
        comments: Vec<Comment>,
    }

    #[async_trait]
    impl LabelApi for FakePlatform {
        async fn list_labels(&self, pr: u64) -> std::result::Result<Vec<String>, BoxError> {
            self.labels.list_labels(pr).await
        }

        async fn add_label(&self, pr: u64, label: &str) -> std::result::Result<(), BoxError> {
            self.labels.add_label(pr, label).await
        }

        async fn remove_label(&self, pr: u64, label: &str) -> std::result::Result<(), BoxError> {
            self.labels.remove_label(pr, label).await
        }
    }

    #[async_trait]
    impl CommentSource for FakePlatform {
        async fn list_comments(&self, _pr: u64) -> std::result::Result<Vec<Comment>, BoxError> {
            Ok(self.comments.clone())
        }
    }

    #[test]
    fn test_check_ci_command() {
        assert!(is_check_ci_command("/check-ci"));
        assert!(is_check_ci_command("please\n/CHECK-CI  \nthanks"));
        assert!(!is_check_ci_command("/check-ci now"));
        assert!(!is_check_ci_command("run /check-ci"));
    }

    #[test]
    fn test_all_jobs_succeeded() {
        let labeler = CiLabeler::new(&config());
        let c = table(&["| unit | success | a |", "| lint | success | b |"]);

        let report = labeler.process_comment(&c, &set(&["ci_running"]), 2).unwrap();
        assert_eq!(report.aggregate.as_deref(), Some("ci_success"));
        assert_eq!(report.desired.as_deref(), Some("ci_success"));
        assert!(!report.downgraded);
        assert_eq!(
            report.ops,
            vec![
                LabelOp::Add("ci_success".to_string()),
                LabelOp::Remove("ci_running".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_jobs_downgrade_success() {
        let labeler = CiLabeler::new(&config());
        let c = table(&["| unit | success | a |", "| lint | success | b |"]);

        let report = labeler.process_comment(&c, &BTreeSet::new(), 3).unwrap();
        assert_eq!(report.aggregate.as_deref(), Some("ci_success"));
        assert_eq!(report.desired.as_deref(), Some("ci_running"));
        assert!(report.downgraded);
        assert_eq!(report.ops, vec![LabelOp::Add("ci_running".to_string())]);
    }

    #[test]
    fn test_missing_jobs_do_not_downgrade_failure() {
        let labeler = CiLabeler::new(&config());
        let c = table(&["| unit | failed | a |"]);

        let report = labeler.process_comment(&c, &BTreeSet::new(), 5).unwrap();
        assert_eq!(report.desired.as_deref(), Some("ci_failed"));
        assert!(!report.downgraded);
    }

    #[test]
    fn test_downgrade_without_running_label_clears() {
        let mut cfg = config();
        cfg.job_running_status = StatusDescAndLabel::default();
        let labeler = CiLabeler::new(&cfg);
        let c = table(&["| unit | success | a |"]);

        let report = labeler.process_comment(&c, &set(&["ci_success"]), 2).unwrap();
        assert!(report.downgraded);
        assert_eq!(report.desired, None);
        assert_eq!(report.ops, vec![LabelOp::Remove("ci_success".to_string())]);
    }

    #[test]
    fn test_all_rows_unrecognised_removes_managed_labels() {
        let labeler = CiLabeler::new(&config());
        let c = table(&["| unit | ??? | a |", "| lint | skipped | b |"]);

        let report = labeler
            .process_comment(&c, &set(&["ci_failed", "bug"]), 2)
            .unwrap();
        assert!(report.status_set.is_empty());
        assert_eq!(report.dropped_rows, 2);
        assert_eq!(report.aggregate, None);
        assert_eq!(report.ops, vec![LabelOp::Remove("ci_failed".to_string())]);
    }

    #[test]
    fn test_not_a_ci_comment() {
        let labeler = CiLabeler::new(&config());
        let c = format!("{}\n{}\n", table(&["| a | success | b |"]), TITLE);

        assert!(matches!(
            labeler.process_comment(&c, &BTreeSet::new(), 1),
            Err(ExtractError::NotCiTable { occurrences: 2 })
        ));
    }

    #[test]
    fn test_latest_ci_comment() {
        let ci_old = table(&["| unit | failed | a |"]);
        let ci_new = table(&["| unit | success | a |"]);
        let comments = vec![
            comment(3, "ci-bot", &ci_new, 30),
            comment(1, "ci-bot", &ci_old, 10),
            comment(2, "alice", &ci_new, 40),
            comment(4, "ci-bot", "/retest", 50),
        ];

        let latest = latest_ci_comment(&comments, "ci-bot", TITLE).unwrap();
        assert_eq!(latest.id, 3);
        assert!(latest_ci_comment(&comments, "other-bot", TITLE).is_none());
    }

    #[tokio::test]
    async fn test_reconcile_reads_labels_and_applies() {
        let labeler = CiLabeler::new(&config());
        let api = FakeLabels::with_labels(&["ci_failed", "bug"]);
        let c = table(&["| unit | success | a |"]);

        let report = labeler.reconcile(&api, 1, &c, 1, false).await.unwrap().unwrap();
        assert_eq!(report.desired.as_deref(), Some("ci_success"));
        assert_eq!(api.current(), set(&["bug", "ci_success"]));

        // Second run sees the new labels and does nothing
        let again = labeler.reconcile(&api, 1, &c, 1, false).await.unwrap().unwrap();
        assert!(again.ops.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_dry_run_leaves_labels() {
        let labeler = CiLabeler::new(&config());
        let api = FakeLabels::with_labels(&["ci_failed"]);
        let c = table(&["| unit | success | a |"]);

        let report = labeler.reconcile(&api, 1, &c, 1, true).await.unwrap().unwrap();
        assert_eq!(report.ops.len(), 2);
        assert_eq!(api.current(), set(&["ci_failed"]));
    }

    #[tokio::test]
    async fn test_reconcile_reports_label_failures() {
        let labeler = CiLabeler::new(&config());
        let api = FakeLabels::with_labels(&["ci_failed"]).reject("ci_success");
        let c = table(&["| unit | success | a |"]);

        let err = labeler.reconcile(&api, 1, &c, 1, false).await.unwrap_err();
        match err {
            Error::LabelOps(errors) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected error: {}", other),
        }
        assert!(api.current().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_ignores_non_table() {
        let labeler = CiLabeler::new(&config());
        let api = FakeLabels::with_labels(&["ci_failed"]);

        let report = labeler.reconcile(&api, 1, "hello", 1, false).await.unwrap();
        assert!(report.is_none());
        assert_eq!(api.current(), set(&["ci_failed"]));
    }

    struct UnreachableLabels;

    #[async_trait]
    impl LabelApi for UnreachableLabels {
        async fn list_labels(&self, _pr: u64) -> std::result::Result<Vec<String>, BoxError> {
            Err("platform down".into())
        }

        async fn add_label(&self, _pr: u64, _label: &str) -> std::result::Result<(), BoxError> {
            Err("platform down".into())
        }

        async fn remove_label(&self, _pr: u64, _label: &str) -> std::result::Result<(), BoxError> {
            Err("platform down".into())
        }
    }

    #[tokio::test]
    async fn test_reconcile_non_table_skips_label_lookup() {
        let labeler = CiLabeler::new(&config());

        let report = labeler
            .reconcile(&UnreachableLabels, 1, "hello", 1, false)
            .await
            .unwrap();
        assert!(report.is_none());

        let empty = format!("{}\n| --- | --- | --- |\nno rows yet", TITLE);
        let report = labeler
            .reconcile(&UnreachableLabels, 1, &empty, 1, false)
            .await
            .unwrap();
        assert!(report.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_table_reports_label_lookup_failure() {
        let labeler = CiLabeler::new(&config());
        let c = table(&["| unit | success | a |"]);

        let err = labeler
            .reconcile(&UnreachableLabels, 1, &c, 1, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Platform(_)));
    }

    #[tokio::test]
    async fn test_handle_check_ci_uses_latest_bot_comment() {
        let labeler = CiLabeler::new(&config());
        let platform = FakePlatform {
            labels: FakeLabels::with_labels(&["ci_running"]),
            comments: vec![
                comment(1, "ci-bot", &table(&["| unit | running | a |"]), 1),
                comment(2, "ci-bot", &table(&["| unit | failed | a |"]), 2),
            ],
        };

        let report = labeler
            .handle_comment_event(&platform, 9, "/check-ci", "ci-bot", 1, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.desired.as_deref(), Some("ci_failed"));
        assert_eq!(platform.labels.current(), set(&["ci_failed"]));
    }

    #[tokio::test]
    async fn test_handle_check_ci_without_bot_comment() {
        let labeler = CiLabeler::new(&config());
        let platform = FakePlatform {
            labels: FakeLabels::with_labels(&["ci_running"]),
            comments: vec![comment(1, "alice", "lgtm", 1)],
        };

        let report = labeler
            .handle_comment_event(&platform, 9, "/check-ci", "ci-bot", 1, false)
            .await
            .unwrap();
        assert!(report.is_none());
        assert_eq!(platform.labels.current(), set(&["ci_running"]));
    }

    #[tokio::test]
    async fn test_handle_ci_comment_directly() {
        let labeler = CiLabeler::new(&config());
        let platform = FakePlatform {
            labels: FakeLabels::default(),
            comments: Vec::new(),
        };
        let body = table(&["| unit | error | a |", "| lint | success | b |"]);

        let report = labeler
            .handle_comment_event(&platform, 9, &body, "ci-bot", 2, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.desired.as_deref(), Some("ci_error"));
        assert_eq!(platform.labels.current(), set(&["ci_error"]));
    }

    #[tokio::test]
    async fn test_handle_unrelated_comment() {
        let labeler = CiLabeler::new(&config());
        let platform = FakePlatform {
            labels: FakeLabels::with_labels(&["ci_failed"]),
            comments: Vec::new(),
        };

        let report = labeler
            .handle_comment_event(&platform, 9, "looks good", "ci-bot", 1, false)
            .await
            .unwrap();
        assert!(report.is_none());
        assert!(platform.labels.calls.lock().unwrap().is_empty());
    }
}
