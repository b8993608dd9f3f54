//! Collaboration workflow
//!
//! Turns an answer into a live mentoring session:
//!
//! 1. load the question and fail fast when it is missing or already answered
//! 2. resolve the score increment for the question's skill at the claimed level
//! 3. open a voice channel scoped to this attempt (`discussion-{question}-{collaboration}`)
//! 4. flip the question to answered (compare-and-set, exactly one winner)
//! 5. persist the collaboration record
//! 6. credit the mentor's score
//!
//! Channel idempotency is per attempt: concurrent answers each get their own
//! channel, so the losers can close theirs without touching the winner's.
//!
//! A failure before step 4 leaves nothing behind. A failure at step 4 closes
//! the channel this attempt opened. Steps 4 and 5 are never unwound once they
//! succeed; a score that cannot be credited is left pending and picked up by
//! [`CollaborationWorkflow::reconcile_scores`].

use bson::{doc, oid::ObjectId, Bson, DateTime};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::catalog::SkillCatalog;
use crate::channels::ChannelAdapter;
use crate::db::schemas::CollaborationDoc;
use crate::db::{by_id, DocumentStore, Patch};
use crate::members::MemberRegistry;
use crate::nats::{DomainEvent, EventSink};
use crate::questions::QuestionStore;
use crate::types::{MentorError, Result};

/// Default bound on each collaborator call
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// Workflow tuning
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Upper bound on every store and channel call
    pub step_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }
}

/// Result of a successful answer
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub collaboration: CollaborationDoc,
    /// Display name of the question's skill
    pub skill: String,
    /// The mentor's score could not be credited yet
    pub score_pending: bool,
}

/// Result of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileSummary {
    pub examined: usize,
    pub applied: usize,
    pub failed: usize,
}

/// Outcome of crediting one collaboration's score
#[derive(Debug, Clone, Copy, PartialEq)]
enum Settlement {
    Applied,
    /// Another settler claimed it first
    Skipped,
    /// Not applied, claim released; safe to retry
    Pending,
    /// Increment timed out after the claim; left claimed so it is never
    /// applied twice
    Unknown,
}

#[derive(Clone)]
pub struct CollaborationWorkflow {
    questions: QuestionStore,
    catalog: SkillCatalog,
    members: MemberRegistry,
    collaborations: Arc<dyn DocumentStore<CollaborationDoc>>,
    channels: Arc<dyn ChannelAdapter>,
    events: Option<Arc<dyn EventSink>>,
    config: WorkflowConfig,
}

impl CollaborationWorkflow {
    pub fn new(
        questions: QuestionStore,
        catalog: SkillCatalog,
        members: MemberRegistry,
        collaborations: Arc<dyn DocumentStore<CollaborationDoc>>,
        channels: Arc<dyn ChannelAdapter>,
    ) -> Self {
        Self {
            questions,
            catalog,
            members,
            collaborations,
            channels,
            events: None,
            config: WorkflowConfig::default(),
        }
    }

    /// Publish domain events to `sink`
    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Answer `question_id` as `mentor_id` at `claimed_level`
    pub async fn answer(
        &self,
        question_id: ObjectId,
        mentor_id: &str,
        claimed_level: i32,
    ) -> Result<AnswerOutcome> {
        let mentor_id = mentor_id.trim();
        if mentor_id.is_empty() {
            return Err(MentorError::InvalidInput("Mentor id is empty".into()));
        }

        let question = self
            .bounded("load question", self.questions.find(question_id))
            .await?;
        if question.answered {
            return Err(MentorError::AlreadyAnswered(question_id.to_hex()));
        }

        let level = self
            .bounded(
                "resolve skill level",
                self.catalog.resolve_increment(&question.skill, claimed_level),
            )
            .await?;

        let collaboration_id = ObjectId::new();
        let scope_key = format!("discussion-{}-{}", question_id.to_hex(), collaboration_id.to_hex());
        let channel_id = self.open_channel(&scope_key).await?;

        if let Err(e) = self
            .bounded(
                "mark question answered",
                self.questions.mark_answered(question_id, collaboration_id),
            )
            .await
        {
            debug!(question = %question_id, error = %e, "Answer lost, releasing channel");
            self.release_channel(&channel_id).await;
            return Err(e);
        }

        let record = CollaborationDoc {
            _id: Some(collaboration_id),
            metadata: Default::default(),
            question_id,
            mentee_id: question.asker_id.clone(),
            mentor_id: mentor_id.to_string(),
            skill_id: level.skill_id,
            skill_level: level.level,
            voice_channel_id: channel_id.clone(),
            mentor_score_increase: level.score_increment,
            score_applied: false,
            started_at: DateTime::now(),
            ended_at: None,
        };

        let mut collaboration = match self
            .bounded("insert collaboration", self.collaborations.insert(record))
            .await
        {
            Ok(collaboration) => collaboration,
            Err(e) => {
                // The question is answered and the channel is live; only the
                // record is missing.
                error!(
                    question = %question_id,
                    collaboration = %collaboration_id,
                    channel = %channel_id,
                    error = %e,
                    "Collaboration record not persisted after question was answered"
                );
                return Err(match e {
                    MentorError::Database(_) => e,
                    other => MentorError::Database(other.to_string()),
                });
            }
        };

        info!(
            question = %question_id,
            collaboration = %collaboration_id,
            mentor = %mentor_id,
            skill = %level.skill_name,
            level = level.level,
            channel = %channel_id,
            "Collaboration started"
        );
        self.emit(DomainEvent::CollaborationStarted {
            collaboration: collaboration.view(),
        })
        .await;

        let settlement = self.settle_score(&collaboration).await;
        collaboration.score_applied = matches!(settlement, Settlement::Applied | Settlement::Unknown);

        Ok(AnswerOutcome {
            collaboration,
            skill: level.skill_name,
            score_pending: matches!(settlement, Settlement::Pending | Settlement::Unknown),
        })
    }

    pub async fn get(&self, collaboration_id: ObjectId) -> Result<CollaborationDoc> {
        self.collaborations
            .find_one(by_id(collaboration_id))
            .await?
            .ok_or_else(|| MentorError::CollaborationNotFound(collaboration_id.to_hex()))
    }

    /// End a session: stamp `ended_at` once and close its voice channel
    pub async fn end_session(&self, collaboration_id: ObjectId) -> Result<CollaborationDoc> {
        let ended = self
            .bounded(
                "end collaboration",
                self.collaborations.update_one(
                    doc! { "_id": collaboration_id, "ended_at": Bson::Null },
                    Patch::set("ended_at", DateTime::now()),
                ),
            )
            .await?;

        let Some(collaboration) = ended else {
            return match self.get(collaboration_id).await {
                Ok(_) => Err(MentorError::Conflict(format!(
                    "Collaboration {} has already ended",
                    collaboration_id
                ))),
                Err(e) => Err(e),
            };
        };

        self.release_channel(&collaboration.voice_channel_id).await;
        info!(collaboration = %collaboration_id, "Collaboration ended");
        self.emit(DomainEvent::CollaborationEnded {
            collaboration: collaboration.view(),
        })
        .await;

        Ok(collaboration)
    }

    /// Credit every collaboration whose score is still pending
    pub async fn reconcile_scores(&self) -> Result<ReconcileSummary> {
        let pending = self
            .bounded(
                "list pending scores",
                self.collaborations.find_many(doc! { "score_applied": false }),
            )
            .await?;

        let mut summary = ReconcileSummary {
            examined: pending.len(),
            ..Default::default()
        };

        for collaboration in &pending {
            match self.settle_score(collaboration).await {
                Settlement::Applied => summary.applied += 1,
                Settlement::Skipped => {}
                Settlement::Pending | Settlement::Unknown => summary.failed += 1,
            }
        }

        info!(
            examined = summary.examined,
            applied = summary.applied,
            failed = summary.failed,
            "Score reconciliation finished"
        );
        Ok(summary)
    }

    /// Claim the collaboration's score, then credit it.
    ///
    /// The claim (`score_applied: false -> true`) makes each increase apply at
    /// most once across concurrent settlers.
    async fn settle_score(&self, collaboration: &CollaborationDoc) -> Settlement {
        let Some(id) = collaboration._id else {
            return Settlement::Skipped;
        };
        let step = self.config.step_timeout;

        let claim = self.bounded(
            "claim score",
            self.collaborations.update_one(
                doc! { "_id": id, "score_applied": false },
                Patch::set("score_applied", true),
            ),
        );
        match claim.await {
            Ok(Some(_)) => {}
            Ok(None) => return Settlement::Skipped,
            Err(e) => {
                warn!(collaboration = %id, error = %e, "Could not claim score settlement");
                self.score_pending(collaboration, &e).await;
                return Settlement::Pending;
            }
        }

        let increase = self
            .members
            .apply_score_increase(&collaboration.mentor_id, collaboration.mentor_score_increase);

        let failure = match tokio::time::timeout(step, increase).await {
            Ok(Ok(member)) => {
                debug!(
                    collaboration = %id,
                    mentor = %member.discord_id,
                    score = member.mentor_score,
                    "Score settled"
                );
                return Settlement::Applied;
            }
            Ok(Err(e)) => e,
            Err(_) => {
                error!(
                    collaboration = %id,
                    mentor = %collaboration.mentor_id,
                    delta = collaboration.mentor_score_increase,
                    "Score increase timed out; outcome unknown, left claimed for manual review"
                );
                let e = MentorError::Database("score increase timed out".into());
                self.score_pending(collaboration, &e).await;
                return Settlement::Unknown;
            }
        };

        warn!(
            collaboration = %id,
            mentor = %collaboration.mentor_id,
            error = %failure,
            "Score increase failed, releasing claim"
        );

        let release = self.bounded(
            "release score claim",
            self.collaborations.update_one(
                doc! { "_id": id, "score_applied": true },
                Patch::set("score_applied", false),
            ),
        );
        if let Err(e) = release.await {
            error!(collaboration = %id, error = %e, "Failed to release score claim");
        }

        self.score_pending(collaboration, &failure).await;
        Settlement::Pending
    }

    async fn open_channel(&self, scope_key: &str) -> Result<String> {
        match tokio::time::timeout(self.config.step_timeout, self.channels.open_channel(scope_key))
            .await
        {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(MentorError::ChannelCreationFailed(msg))) => {
                Err(MentorError::ChannelCreationFailed(msg))
            }
            Ok(Err(e)) => Err(MentorError::ChannelCreationFailed(e.to_string())),
            Err(_) => Err(MentorError::ChannelCreationFailed(format!(
                "opening {} timed out",
                scope_key
            ))),
        }
    }

    /// Best-effort close; a failure leaks the channel and is only logged
    async fn release_channel(&self, channel_id: &str) {
        match tokio::time::timeout(self.config.step_timeout, self.channels.close_channel(channel_id))
            .await
        {
            Ok(Ok(())) => debug!(channel = %channel_id, "Channel closed"),
            Ok(Err(e)) => {
                warn!(channel = %channel_id, error = %e, "Leaked channel: close failed")
            }
            Err(_) => warn!(channel = %channel_id, "Leaked channel: close timed out"),
        }
    }

    async fn score_pending(&self, collaboration: &CollaborationDoc, reason: &MentorError) {
        self.emit(DomainEvent::ScorePending {
            collaboration_id: collaboration._id.map(|id| id.to_hex()).unwrap_or_default(),
            mentor_id: collaboration.mentor_id.clone(),
            delta: collaboration.mentor_score_increase,
            reason: reason.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: DomainEvent) {
        if let Some(sink) = &self.events {
            sink.publish(event).await;
        }
    }

    /// Bound a store call by the step timeout; a timeout is a store failure
    async fn bounded<T>(&self, step: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.step_timeout, fut)
            .await
            .map_err(|_| MentorError::Database(format!("{} timed out", step)))?
    }
}

/// Periodically credit scores left pending by failed settlements
pub fn spawn_reconcile_task(
    workflow: CollaborationWorkflow,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    let handle = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // The first tick fires immediately
        timer.tick().await;
        loop {
            timer.tick().await;
            if let Err(e) = workflow.reconcile_scores().await {
                warn!(error = %e, "Scheduled score reconciliation failed");
            }
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Score reconciliation task started"
    );
    handle
}
