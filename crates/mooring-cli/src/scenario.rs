//! # Run Subcommand
//!
//! Replays a scenario through the anchoring engine. A scenario is a config
//! plus an ordered list of submissions:
//!
//! ```yaml
//! config:
//!   anchor_on_request: false
//!   anchor_delay_ms: 0
//! submissions:
//!   - { document: docA, nonce: 1 }
//!   - { document: docA, nonce: 2 }
//!   - { document: docB, nonce: 0, signed: true }
//! ```
//!
//! Each submission becomes a plain commit (optionally behind a signed
//! wrapper) in a fresh in-memory store. In batched mode one cycle runs after
//! all submissions. The command waits for every expected completion notice
//! and prints the report as JSON.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use indexmap::IndexMap;
use mooring_anchor::{
    AnchorConfig, AnchorError, AnchorScheduler, AnchoredDocument, CompletionEvent, MockLedger,
};
use mooring_core::{ContentRef, DocumentId, Record};
use mooring_store::{CommitStore, MemoryCommitStore};
use serde::{Deserialize, Serialize};

/// Slack on top of `anchor_delay` when waiting for notices.
const NOTICE_GRACE: Duration = Duration::from_secs(5);

/// Arguments for the `mooring run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (YAML or JSON).
    #[arg(long)]
    pub scenario: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// A scenario file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub config: AnchorConfig,
    pub submissions: Vec<Submission>,
}

/// One submitted update.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Submission {
    pub document: String,
    #[serde(default)]
    pub nonce: Option<u64>,
    /// Wrap the commit in a signed envelope.
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// One anchored document in the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSummary {
    pub document: String,
    pub root: ContentRef,
    pub proof: ContentRef,
    pub anchor_commit: ContentRef,
    pub chain_id: String,
    pub block_number: u64,
    pub tx_ref: String,
}

/// Output of a scenario run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioReport {
    pub anchor_on_request: bool,
    pub submitted: usize,
    pub anchors: Vec<AnchorSummary>,
    pub notices: Vec<CompletionEvent>,
}

/// Execute the run subcommand.
pub fn run_scenario(args: &RunArgs) -> Result<u8> {
    let scenario = load_scenario(&args.scenario)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let report = runtime.block_on(execute(scenario))?;

    let mut json = serde_json::to_string_pretty(&report).context("failed to render report")?;
    json.push('\n');
    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?,
        None => print!("{json}"),
    }

    let failed = report
        .notices
        .iter()
        .filter(|n| !n.is_completed())
        .count();
    Ok(if failed == 0 { 0 } else { 2 })
}

/// Read a scenario file and apply `MOORING_*` environment overrides to its config.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let mut scenario: Scenario = serde_yaml::from_str(&text)
        .with_context(|| format!("invalid scenario {}", path.display()))?;
    scenario.config = scenario
        .config
        .with_overrides(|var| std::env::var(var).ok())
        .context("invalid environment override")?;
    Ok(scenario)
}

/// Run `scenario` to completion.
pub async fn execute(scenario: Scenario) -> Result<ScenarioReport> {
    if scenario.submissions.is_empty() {
        bail!("scenario has no submissions");
    }
    let config = scenario.config;
    let store = Arc::new(MemoryCommitStore::new());
    let ledger = Arc::new(MockLedger::new(config.chain_id.clone()));
    let scheduler = AnchorScheduler::new(config.clone(), store.clone(), ledger);

    let documents = ordered_documents(&scenario.submissions)?;
    let mut subscriptions: Vec<_> = documents
        .keys()
        .map(|id| scheduler.subscribe(id.clone()))
        .collect();

    let mut anchors = Vec::new();
    for (seq, submission) in scenario.submissions.iter().enumerate() {
        let document_id = DocumentId::new(submission.document.as_str())
            .with_context(|| format!("submission {seq}: invalid document id"))?;
        let commit = seed_commit(store.as_ref(), seq, submission).await?;
        tracing::info!(document = %document_id, commit = %commit, nonce = ?submission.nonce, "submitting");
        match scheduler.request_anchor(document_id, commit).await {
            Ok(submitted) => anchors.extend(submitted.into_anchored().as_ref().map(summarize)),
            // Immediate-mode failures already produced a FAILED notice.
            Err(e) if config.anchor_on_request && !matches!(e, AnchorError::ShutDown) => {
                tracing::warn!(error = %e, "submission {seq} failed")
            }
            Err(e) => return Err(e).with_context(|| format!("submission {seq} rejected")),
        }
    }

    if !config.anchor_on_request {
        let report = scheduler.anchor().await.context("anchor cycle failed")?;
        anchors.extend(report.anchored.iter().map(summarize));
    }

    let wait = config.anchor_delay + NOTICE_GRACE;
    let mut notices = Vec::new();
    for ((document_id, submissions), subscription) in documents.iter().zip(&mut subscriptions) {
        let expected = if config.anchor_on_request { *submissions } else { 1 };
        for _ in 0..expected {
            let notice = tokio::time::timeout(wait, subscription.next())
                .await
                .with_context(|| format!("timed out waiting for notice for {document_id}"))?
                .with_context(|| format!("notice stream for {document_id} closed"))?;
            notices.push(notice);
        }
    }

    scheduler.shutdown();
    Ok(ScenarioReport {
        anchor_on_request: config.anchor_on_request,
        submitted: scenario.submissions.len(),
        anchors,
        notices,
    })
}

async fn seed_commit(
    store: &dyn CommitStore,
    seq: usize,
    submission: &Submission,
) -> Result<ContentRef> {
    let body = serde_json::json!({
        "document": submission.document,
        "seq": seq,
        "data": submission.body,
    });
    let payload = store
        .store(&Record::plain(submission.nonce, body))
        .await
        .with_context(|| format!("submission {seq}: failed to store commit"))?;
    if !submission.signed {
        return Ok(payload);
    }
    store
        .store(&Record::signed(payload))
        .await
        .with_context(|| format!("submission {seq}: failed to store signed wrapper"))
}

fn summarize(anchored: &AnchoredDocument) -> AnchorSummary {
    AnchorSummary {
        document: anchored.request.document_id.to_string(),
        root: anchored.anchor.proof.root,
        proof: anchored.anchor.proof_ref,
        anchor_commit: anchored.anchor.commit_ref,
        chain_id: anchored.anchor.proof.chain_id.clone(),
        block_number: anchored.anchor.proof.block_number,
        tx_ref: anchored.anchor.proof.tx_ref.clone(),
    }
}

/// Distinct documents in first-appearance order, with submission counts.
fn ordered_documents(submissions: &[Submission]) -> Result<IndexMap<DocumentId, usize>> {
    let mut out = IndexMap::new();
    for (seq, s) in submissions.iter().enumerate() {
        let id = DocumentId::new(s.document.as_str())
            .with_context(|| format!("submission {seq}: invalid document id"))?;
        *out.entry(id).or_insert(0) += 1;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mooring_anchor::CompletionStatus;

    fn scenario(yaml: &str) -> Scenario {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[tokio::test]
    async fn batched_scenario_anchors_one_commit_per_document() {
        let report = execute(scenario(
            r#"
config:
  anchor_on_request: false
  anchor_delay_ms: 0
submissions:
  - { document: docA, nonce: 1 }
  - { document: docA, nonce: 2 }
  - { document: docB, nonce: 0 }
"#,
        ))
        .await
        .unwrap();

        assert_eq!(report.submitted, 3);
        assert_eq!(report.anchors.len(), 2);
        assert_eq!(report.anchors[0].document, "docA");
        assert_eq!(report.anchors[1].document, "docB");
        assert_eq!(report.notices.len(), 2);
        assert!(report
            .notices
            .iter()
            .all(|n| n.status == CompletionStatus::Completed));
        assert_eq!(
            report.notices[0].anchor_commit,
            Some(report.anchors[0].anchor_commit)
        );
    }

    #[tokio::test]
    async fn immediate_scenario_notifies_every_submission() {
        let report = execute(scenario(
            r#"
config: { anchor_on_request: true }
submissions:
  - { document: doc, nonce: 1, signed: true }
  - { document: doc, nonce: 2 }
"#,
        ))
        .await
        .unwrap();
        assert_eq!(report.anchors.len(), 2);
        assert_eq!(report.notices.len(), 2);
        assert_eq!(report.anchors[0].block_number, 1);
        assert_eq!(report.anchors[1].block_number, 2);
    }

    #[tokio::test]
    async fn empty_scenario_is_rejected() {
        let err = execute(scenario("submissions: []\n")).await.unwrap_err();
        assert!(err.to_string().contains("no submissions"));
    }

    #[test]
    fn invalid_document_is_rejected() {
        let s = scenario("submissions:\n  - { document: \"has space\" }\n");
        assert!(ordered_documents(&s.submissions).is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(
            &path,
            r#"{"config": {"chain_id": "eip155:5"}, "submissions": [{"document": "d"}]}"#,
        )
        .unwrap();
        let s = load_scenario(&path).unwrap();
        assert_eq!(s.submissions.len(), 1);
        assert_eq!(s.submissions[0].nonce, None);
        assert!(!s.submissions[0].signed);
    }
}
