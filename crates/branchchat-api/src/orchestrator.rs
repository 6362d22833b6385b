//! Sequencing of a single conversational turn.
//!
//! A turn persists the question as a tree node, gathers document context and
//! a completion, and persists the normalized answer as the question's child.
//! Each store write is its own transaction; nothing spans a collaborator call.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use branchchat_db::{Database, NewMessage, StoreError};
use branchchat_llm::{Completer, complete_or_degrade, normalize_reply};
use branchchat_rag::{RetrievalError, Retriever};
use branchchat_types::models::Message;

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("parent message not found: {0}")]
    ParentNotFound(Uuid),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("retrieval failure: {0}")]
    Retrieval(RetrievalError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<RetrievalError> for TurnError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::NotFound(doc_id) => Self::DocumentNotFound(doc_id),
            other => Self::Retrieval(other),
        }
    }
}

/// Treats a blank document handle as no handle at all.
pub(crate) fn document_handle(raw: Option<String>) -> Option<String> {
    raw.filter(|id| !id.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct TurnInput {
    pub question: String,
    pub parent_id: Option<Uuid>,
    pub doc_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub user_message: Message,
    pub ai_message: Message,
}

#[derive(Clone)]
pub struct Orchestrator {
    db: Arc<Database>,
    retriever: Arc<dyn Retriever>,
    completer: Arc<dyn Completer>,
}

impl Orchestrator {
    pub fn new(
        db: Arc<Database>,
        retriever: Arc<dyn Retriever>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        Self {
            db,
            retriever,
            completer,
        }
    }

    /// Runs one turn for `owner_id`.
    ///
    /// A foreign or missing parent aborts before anything is written. An
    /// unknown document aborts after the question is stored, leaving it
    /// unanswered in the tree. A failed completion does not abort: the
    /// failure text is stored as the answer.
    pub async fn create_turn(&self, owner_id: Uuid, input: TurnInput) -> Result<Turn, TurnError> {
        let TurnInput {
            question,
            parent_id,
            doc_id,
        } = input;
        let doc_id = document_handle(doc_id);

        let user_msg = NewMessage::user(question.clone()).with_doc(doc_id.clone());
        let user_message = self
            .store(move |db| db.create_message(owner_id, parent_id, user_msg))
            .await
            .map_err(|e| match (e, parent_id) {
                (TurnError::Persistence(StoreError::NotFound { .. }), Some(pid)) => {
                    TurnError::ParentNotFound(pid)
                }
                (other, _) => other,
            })?;

        let context = match doc_id.as_deref() {
            Some(doc) => match self.retriever.query(doc, &question).await {
                Ok(context) => context,
                Err(e) => {
                    warn!(
                        "Turn aborted after storing question {}: {}",
                        user_message.id, e
                    );
                    return Err(e.into());
                }
            },
            None => String::new(),
        };

        let answer =
            normalize_reply(&complete_or_degrade(self.completer.as_ref(), &context, &question).await);

        let ai_msg = NewMessage::assistant(answer).with_doc(doc_id);
        let question_id = user_message.id;
        let ai_message = self
            .store(move |db| db.create_child(owner_id, question_id, ai_msg))
            .await?;

        info!(
            "Turn complete for {}: question {} answered by {}",
            owner_id, user_message.id, ai_message.id
        );

        Ok(Turn {
            user_message,
            ai_message,
        })
    }

    /// Answers a question from a document without touching the tree.
    pub async fn ask_document(&self, doc_id: &str, question: &str) -> Result<String, TurnError> {
        let context = self.retriever.query(doc_id, question).await?;
        let answer = complete_or_degrade(self.completer.as_ref(), &context, question).await;
        Ok(normalize_reply(&answer))
    }

    async fn store<F, T>(&self, f: F) -> Result<T, TurnError>
    where
        F: FnOnce(&Database) -> branchchat_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| TurnError::Task(e.to_string()))?
            .map_err(TurnError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use branchchat_llm::CompletionError;

    use super::*;

    struct FakeRetriever {
        docs: HashMap<String, String>,
    }

    #[async_trait]
    impl Retriever for FakeRetriever {
        async fn ingest(&self, _uploader_id: Uuid, _bytes: Vec<u8>) -> Result<String, RetrievalError> {
            Err(RetrievalError::EmptyDocument)
        }

        async fn query(&self, doc_id: &str, _question: &str) -> Result<String, RetrievalError> {
            self.docs
                .get(doc_id)
                .cloned()
                .ok_or_else(|| RetrievalError::NotFound(doc_id.to_string()))
        }
    }

    struct ScriptedCompleter;

    #[async_trait]
    impl Completer for ScriptedCompleter {
        async fn complete(&self, context: &str, question: &str) -> Result<String, CompletionError> {
            Ok(format!("**{}** [{}]", question, context))
        }

        fn name(&self) -> &str {
            "ScriptedCompleter"
        }
    }

    struct DownCompleter;

    #[async_trait]
    impl Completer for DownCompleter {
        async fn complete(&self, _context: &str, _question: &str) -> Result<String, CompletionError> {
            Err(CompletionError::Api {
                status: 502,
                body: "bad gateway".into(),
            })
        }

        fn name(&self) -> &str {
            "DownCompleter"
        }
    }

    fn setup(completer: Arc<dyn Completer>) -> (Orchestrator, Arc<Database>, Uuid, Uuid) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        db.create_user(&alice.to_string(), "alice", "h").unwrap();
        db.create_user(&bob.to_string(), "bob", "h").unwrap();

        let retriever = Arc::new(FakeRetriever {
            docs: HashMap::from([("doc-1".to_string(), "Paris is in France.".to_string())]),
        });
        (Orchestrator::new(db.clone(), retriever, completer), db, alice, bob)
    }

    fn input(question: &str, parent_id: Option<Uuid>, doc_id: Option<&str>) -> TurnInput {
        TurnInput {
            question: question.to_string(),
            parent_id,
            doc_id: doc_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn turn_stores_question_and_normalized_answer() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));

        let turn = orch.create_turn(alice, input("Hello", None, None)).await.unwrap();

        assert!(turn.user_message.is_root());
        assert!(turn.user_message.is_user);
        assert_eq!(turn.user_message.content, "Hello");
        assert_eq!(turn.ai_message.parent_id, Some(turn.user_message.id));
        assert!(!turn.ai_message.is_user);
        assert_eq!(turn.ai_message.content, "Hello []");

        let subtree = db.list_subtree(alice, turn.user_message.id).unwrap();
        assert_eq!(subtree, vec![turn.user_message, turn.ai_message]);
    }

    #[tokio::test]
    async fn follow_up_turn_forks_from_parent() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));

        let first = orch.create_turn(alice, input("Hello", None, None)).await.unwrap();
        let second = orch
            .create_turn(alice, input("Follow-up", Some(first.user_message.id), None))
            .await
            .unwrap();

        assert_eq!(second.user_message.parent_id, Some(first.user_message.id));

        let ids: Vec<Uuid> = db.list_tree(alice).unwrap().iter().map(|m| m.id).collect();
        assert_eq!(
            ids,
            vec![
                first.user_message.id,
                first.ai_message.id,
                second.user_message.id,
                second.ai_message.id
            ]
        );
    }

    #[tokio::test]
    async fn document_context_reaches_the_completer() {
        let (orch, _, alice, _) = setup(Arc::new(ScriptedCompleter));

        let turn = orch
            .create_turn(alice, input("Where is Paris?", None, Some("doc-1")))
            .await
            .unwrap();

        assert_eq!(turn.ai_message.content, "Where is Paris? [Paris is in France.]");
        assert_eq!(turn.user_message.doc_id.as_deref(), Some("doc-1"));
        assert_eq!(turn.ai_message.doc_id.as_deref(), Some("doc-1"));
    }

    #[tokio::test]
    async fn foreign_parent_aborts_without_writing() {
        let (orch, db, alice, bob) = setup(Arc::new(ScriptedCompleter));
        let alices = orch.create_turn(alice, input("mine", None, None)).await.unwrap();

        let err = orch
            .create_turn(bob, input("fork", Some(alices.user_message.id), None))
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::ParentNotFound(id) if id == alices.user_message.id));
        assert!(db.list_tree(bob).unwrap().is_empty());
        assert_eq!(db.list_tree(alice).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_document_leaves_question_unanswered() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));

        let err = orch
            .create_turn(alice, input("What does it say?", None, Some("missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::DocumentNotFound(ref d) if d == "missing"));
        let tree = db.list_tree(alice).unwrap();
        assert_eq!(tree.len(), 1);
        assert!(tree[0].is_user);
        assert_eq!(tree[0].content, "What does it say?");
    }

    #[tokio::test]
    async fn blank_document_handle_answers_without_context() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));

        let turn = orch
            .create_turn(alice, input("Hello", None, Some("  ")))
            .await
            .unwrap();

        assert_eq!(turn.ai_message.content, "Hello []");
        assert_eq!(turn.user_message.doc_id, None);
        assert_eq!(turn.ai_message.doc_id, None);
        assert_eq!(db.list_tree(alice).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_completion_is_stored_as_answer() {
        let (orch, _, alice, _) = setup(Arc::new(DownCompleter));

        let turn = orch.create_turn(alice, input("Hi", None, None)).await.unwrap();

        assert_eq!(turn.ai_message.content, "Error: 502 - bad gateway");
        assert_eq!(turn.ai_message.parent_id, Some(turn.user_message.id));
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_parent_become_sibling_branches() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));
        let root = orch.create_turn(alice, input("root", None, None)).await.unwrap();
        let parent = Some(root.user_message.id);

        let (left, right) = tokio::join!(
            orch.create_turn(alice, input("left", parent, None)),
            orch.create_turn(alice, input("right", parent, None)),
        );
        let (left, right) = (left.unwrap(), right.unwrap());

        assert_ne!(left.user_message.id, right.user_message.id);
        for branch in [&left, &right] {
            assert_eq!(branch.user_message.parent_id, parent);
            let subtree = db.list_subtree(alice, branch.user_message.id).unwrap();
            assert_eq!(
                subtree,
                vec![branch.user_message.clone(), branch.ai_message.clone()]
            );
        }
        assert_eq!(db.list_tree(alice).unwrap().len(), 6);
    }

    #[tokio::test]
    async fn ask_document_answers_without_persisting() {
        let (orch, db, alice, _) = setup(Arc::new(ScriptedCompleter));

        let answer = orch.ask_document("doc-1", "Where?").await.unwrap();
        assert_eq!(answer, "Where? [Paris is in France.]");
        assert!(db.list_tree(alice).unwrap().is_empty());

        let err = orch.ask_document("nope", "Where?").await.unwrap_err();
        assert!(matches!(err, TurnError::DocumentNotFound(_)));
    }
}
