//! Question store
//!
//! Questions are opened by mentees and answered exactly once. The answered
//! transition is a compare-and-set on `answered: false`, so of any number of
//! concurrent callers only one wins.

use bson::{doc, oid::ObjectId, Document};
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::schemas::{normalize_skill_name, QuestionDoc};
use crate::db::{by_id, DocumentStore, Patch};
use crate::nats::{DomainEvent, EventSink};
use crate::types::{MentorError, Result};

#[derive(Clone)]
pub struct QuestionStore {
    questions: Arc<dyn DocumentStore<QuestionDoc>>,
    events: Option<Arc<dyn EventSink>>,
}

impl QuestionStore {
    pub fn new(questions: Arc<dyn DocumentStore<QuestionDoc>>) -> Self {
        Self {
            questions,
            events: None,
        }
    }

    /// Announce newly opened questions on `sink`
    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Open a new question for `asker_id`
    pub async fn open(&self, asker_id: &str, body: &str, skill: &str) -> Result<QuestionDoc> {
        let asker_id = asker_id.trim();
        let body = body.trim();
        let skill = normalize_skill_name(skill);

        if asker_id.is_empty() {
            return Err(MentorError::InvalidInput("Asker id is empty".into()));
        }
        if body.is_empty() {
            return Err(MentorError::InvalidInput("Question text is empty".into()));
        }
        if skill.is_empty() {
            return Err(MentorError::InvalidInput("Skill is empty".into()));
        }

        let question = self
            .questions
            .insert(QuestionDoc::new(asker_id.to_string(), body.to_string(), skill))
            .await?;

        info!(
            question = %question.id_hex(),
            asker = %question.asker_id,
            skill = %question.skill,
            "Question opened"
        );
        if let Some(sink) = &self.events {
            sink.publish(DomainEvent::QuestionOpened {
                question: question.view(),
            })
            .await;
        }
        Ok(question)
    }

    pub async fn find(&self, id: ObjectId) -> Result<QuestionDoc> {
        self.questions
            .find_one(by_id(id))
            .await?
            .ok_or_else(|| MentorError::QuestionNotFound(id.to_hex()))
    }

    /// Open questions, optionally restricted to one skill, oldest first
    pub async fn list_open(&self, skill: Option<&str>) -> Result<Vec<QuestionDoc>> {
        let mut filter: Document = doc! { "answered": false };
        if let Some(skill) = skill {
            filter.insert("skill", normalize_skill_name(skill));
        }

        let mut questions = self.questions.find_many(filter).await?;
        questions.sort_by_key(|q| q.asked_at);
        Ok(questions)
    }

    /// Flip `answered` and record the collaboration, only if still open.
    ///
    /// Fails with `AlreadyAnswered` when another caller got there first and
    /// `QuestionNotFound` when the question does not exist.
    pub async fn mark_answered(
        &self,
        question_id: ObjectId,
        collaboration_id: ObjectId,
    ) -> Result<QuestionDoc> {
        let patch = Patch::set("answered", true).and_set("collaboration_id", collaboration_id);

        let updated = self
            .questions
            .update_one(doc! { "_id": question_id, "answered": false }, patch)
            .await?;

        match updated {
            Some(question) => {
                debug!(
                    question = %question_id,
                    collaboration = %collaboration_id,
                    "Question marked answered"
                );
                Ok(question)
            }
            None => match self.questions.find_one(by_id(question_id)).await? {
                Some(_) => Err(MentorError::AlreadyAnswered(question_id.to_hex())),
                None => Err(MentorError::QuestionNotFound(question_id.to_hex())),
            },
        }
    }
}
