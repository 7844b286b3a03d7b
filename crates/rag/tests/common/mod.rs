//! Shared fixtures: an operations corpus and mock collaborators

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use ops_assist_config::Settings;
use ops_assist_core::{
    AnswerGenerator, Context, DocType, Error, GroundednessJudge, JudgeVerdict, Message, Passage,
    PassageField, PassageMetadata, SourceTier, VectorHit, VectorSearch,
};
use ops_assist_rag::{HashingEmbedder, IndexSnapshot, SnapshotHandle};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn meta(
    doc_type: DocType,
    platform: &str,
    environment: &str,
    days_old: i64,
) -> PassageMetadata {
    PassageMetadata {
        doc_type: Some(doc_type),
        source_tier: Some(SourceTier::Official),
        authority_tier: Some(2),
        last_updated: Some(now() - chrono::Duration::days(days_old)),
        platform: Some(platform.to_string()),
        environment: Some(environment.to_string()),
        ..Default::default()
    }
}

/// Small operations knowledge base
pub fn corpus() -> Vec<Passage> {
    vec![
        Passage::new(
            "kb-101",
            "payroll-runbook",
            "Job PAYROLL_01 ends RC=8 when the input dataset is still locked by the extract step. \
             Wait for the extract to finish and rerun the job.",
        )
        .with_field(PassageField::Title, "PAYROLL_01 ends RC=8")
        .with_field(PassageField::JobName, "PAYROLL_01")
        .with_field(PassageField::ErrorCode, "RC=8")
        .with_metadata(meta(DocType::Manual, "zos", "prod", 20)),
        Passage::new(
            "kb-102",
            "payroll-runbook",
            "Job BILLING_02 ends RC=12 after the database connection times out. \
             Check the connection pool and rerun.",
        )
        .with_field(PassageField::JobName, "BILLING_02")
        .with_field(PassageField::ErrorCode, "RC=12")
        .with_metadata(meta(DocType::Manual, "zos", "prod", 90)),
        Passage::new(
            "kb-103",
            "agent-guide",
            "Restart the scheduler agent on a workstation after applying the monthly patch. \
             Stop the agent, apply the patch, then start the agent again.",
        )
        .with_field(PassageField::Title, "Agent restart after patching")
        .with_metadata(meta(DocType::KnowledgeBase, "linux", "prod", 10)),
        Passage::new(
            "kb-104",
            "agent-guide",
            "On Windows workstations the scheduler agent runs as a service. \
             Restart the service from the services console.",
        )
        .with_field(PassageField::Workstation, "CPU-WS-3")
        .with_metadata(meta(DocType::KnowledgeBase, "windows", "prod", 400)),
        Passage::new(
            "kb-105",
            "forum",
            "When no batch runs overnight check whether the plan was extended and the \
             scheduler agent is linked to the master domain manager.",
        )
        .with_metadata(meta(DocType::Forum, "all", "all", 5)),
        Passage::new(
            "kb-106",
            "messages",
            "Message AWSBIA123E means the workstation link is down. Relink the workstation \
             from the console and confirm the agent status.",
        )
        .with_field(PassageField::MessageId, "AWSBIA123E")
        .with_metadata(meta(DocType::Manual, "aix", "test", 60)),
        Passage::new(
            "kb-107",
            "mobile",
            "The mobile approval app shows pending batch approvals for operators on call.",
        )
        .with_metadata(meta(DocType::Blog, "ios", "prod", 30)),
        Passage::new(
            "kb-108",
            "policy",
            "Production batch reruns require change ticket approval before the job is resubmitted.",
        )
        .with_metadata(meta(DocType::Policy, "all", "production", 200)),
        Passage::new(
            "kb-109",
            "mobile",
            "Batch rerun approval requests reach operators through the mobile console.",
        )
        .with_metadata(meta(DocType::KnowledgeBase, "mobile", "prod", 15)),
    ]
}

pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.retrieval.embedding_dim = 128;
    settings
}

pub fn embedder() -> Arc<HashingEmbedder> {
    Arc::new(HashingEmbedder::new(settings().retrieval.embedding_dim))
}

pub fn snapshot_handle(passages: Vec<Passage>) -> Arc<SnapshotHandle> {
    let snapshot = IndexSnapshot::build(passages, embedder().as_ref(), &settings())
        .expect("snapshot builds");
    Arc::new(SnapshotHandle::with_snapshot(snapshot))
}

/// Generator counting calls and quoting the top context passage
#[derive(Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerGenerator for CountingGenerator {
    async fn generate(
        &self,
        _query: &str,
        context: &Context,
        _history: &[Message],
    ) -> ops_assist_core::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let top = context
            .passages()
            .first()
            .map(|p| p.passage.content.clone())
            .unwrap_or_default();
        Ok(format!("attempt {}: {}", n, top))
    }
}

/// Generator that never answers
pub struct StalledGenerator;

#[async_trait]
impl AnswerGenerator for StalledGenerator {
    async fn generate(
        &self,
        _query: &str,
        _context: &Context,
        _history: &[Message],
    ) -> ops_assist_core::Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }
}

/// Scripted groundedness verdicts; usefulness always passes
pub struct ScriptedJudge {
    script: Mutex<VecDeque<ops_assist_core::Result<bool>>>,
    pub calls: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new(script: Vec<ops_assist_core::Result<bool>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GroundednessJudge for ScriptedJudge {
    async fn judge_groundedness(
        &self,
        _answer: &str,
        _context: &Context,
    ) -> ops_assist_core::Result<JudgeVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(Ok(true)) | None => Ok(JudgeVerdict::pass(0.9, "supported")),
            Some(Ok(false)) => Ok(JudgeVerdict::fail(0.7, "claim not found in context")),
            Some(Err(e)) => Err(e),
        }
    }

    async fn judge_usefulness(
        &self,
        _query: &str,
        _answer: &str,
    ) -> ops_assist_core::Result<JudgeVerdict> {
        Ok(JudgeVerdict::pass(0.8, "addresses the query"))
    }
}

/// Vector side that always errors
pub struct FailingVectorSearch;

#[async_trait]
impl VectorSearch for FailingVectorSearch {
    async fn search(&self, _embedding: &[f32], _k: usize) -> ops_assist_core::Result<Vec<VectorHit>> {
        Err(Error::Retrieval("vector backend unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Vector side slower than any sane timeout
pub struct SlowVectorSearch;

#[async_trait]
impl VectorSearch for SlowVectorSearch {
    async fn search(&self, _embedding: &[f32], _k: usize) -> ops_assist_core::Result<Vec<VectorHit>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
