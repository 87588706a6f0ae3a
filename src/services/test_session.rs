//! Lifecycle of one student's attempt at a test.
//!
//! `Loading -> {Error, Ready}`, `Ready -> Ended`, `Ended -> Submitted`.
//! `Error` and `Submitted` are terminal; a failed submission stays in `Ended`.

use serde::Serialize;

use crate::services::countdown::{Countdown, CountdownEnd};
use crate::services::link_store::{LinkStore, LinkStoreError, SubmissionReceipt, TestRecord};
use crate::services::test_creation::test_id_from_link;
use crate::services::uploads::FileUpload;

pub(crate) const NOT_FOUND_OR_EXPIRED: &str = "Test not found or has expired";

/// Why a session ended up in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum SessionFailure {
    #[error("Invalid test ID")]
    InvalidTestId,
    #[error("{}", NOT_FOUND_OR_EXPIRED)]
    NotFoundOrExpired,
    #[error("Could not load the test. Please try again later.")]
    LookupFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum SessionPhase {
    Loading,
    Error,
    Ready,
    Ended,
    Submitted,
}

impl SessionPhase {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Loading => "loading",
            SessionPhase::Error => "error",
            SessionPhase::Ready => "ready",
            SessionPhase::Ended => "ended",
            SessionPhase::Submitted => "submitted",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SessionState {
    Loading,
    Error { reason: SessionFailure },
    Ready { test: TestRecord },
    Ended { test: TestRecord, reason: CountdownEnd },
    Submitted { test: TestRecord, receipt: SubmissionReceipt },
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionError {
    #[error("cannot {action} while the session is {}", .phase.as_str())]
    WrongPhase { action: &'static str, phase: SessionPhase },
    #[error(transparent)]
    Store(#[from] LinkStoreError),
}

#[derive(Debug)]
pub(crate) struct TestSession {
    test_id: Option<String>,
    state: SessionState,
}

impl TestSession {
    pub(crate) fn new(test_id: Option<String>) -> Self {
        let test_id = test_id.filter(|id| !id.trim().is_empty());
        Self { test_id, state: SessionState::Loading }
    }

    pub(crate) fn from_link(link: &str) -> Self {
        Self::new(test_id_from_link(link))
    }

    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        match self.state {
            SessionState::Loading => SessionPhase::Loading,
            SessionState::Error { .. } => SessionPhase::Error,
            SessionState::Ready { .. } => SessionPhase::Ready,
            SessionState::Ended { .. } => SessionPhase::Ended,
            SessionState::Submitted { .. } => SessionPhase::Submitted,
        }
    }

    pub(crate) fn test(&self) -> Option<&TestRecord> {
        match &self.state {
            SessionState::Ready { test }
            | SessionState::Ended { test, .. }
            | SessionState::Submitted { test, .. } => Some(test),
            SessionState::Loading | SessionState::Error { .. } => None,
        }
    }

    /// Performs the single lookup. Storage failures land in `Error` as well;
    /// the session never retries.
    pub(crate) async fn load(&mut self, store: &LinkStore) -> Result<SessionPhase, SessionError> {
        self.expect_phase("load the test", SessionPhase::Loading)?;

        let Some(test_id) = self.test_id.clone() else {
            tracing::info!("Session opened without a test id");
            self.fail(SessionFailure::InvalidTestId);
            return Ok(self.phase());
        };

        match store.get_test(&test_id).await {
            Ok(Some(test)) => {
                tracing::info!(test_id = %test_id, "Test session ready");
                self.state = SessionState::Ready { test };
            }
            Ok(None) => {
                tracing::info!(test_id = %test_id, "Session test not found or expired");
                self.fail(SessionFailure::NotFoundOrExpired);
            }
            Err(err) => {
                tracing::warn!(error = %err, test_id = %test_id, "Session lookup failed");
                self.fail(SessionFailure::LookupFailed);
            }
        }

        Ok(self.phase())
    }

    /// Fresh countdown for the loaded test.
    pub(crate) fn countdown(&self) -> Option<Countdown> {
        match &self.state {
            SessionState::Ready { test } => Some(Countdown::new(test.duration_minutes)),
            _ => None,
        }
    }

    /// `Ready -> Ended`. Returns false when the session was not running, so a
    /// late timer signal after a manual end is a no-op.
    pub(crate) fn end(&mut self, reason: CountdownEnd) -> bool {
        let state = std::mem::replace(&mut self.state, SessionState::Loading);
        match state {
            SessionState::Ready { test } => {
                tracing::info!(test_id = %test.id, ?reason, "Test session ended");
                self.state = SessionState::Ended { test, reason };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// `Ended -> Submitted`. On failure the session stays in `Ended`.
    pub(crate) async fn submit(
        &mut self,
        store: &LinkStore,
        files: Vec<FileUpload>,
        submitted_by: Option<String>,
    ) -> Result<SubmissionReceipt, SessionError> {
        let test = match &self.state {
            SessionState::Ended { test, .. } => test.clone(),
            _ => {
                return Err(SessionError::WrongPhase {
                    action: "submit answers",
                    phase: self.phase(),
                })
            }
        };

        let receipt = store.record_submission(&test.id, files, submitted_by).await?;
        self.state = SessionState::Submitted { test, receipt: receipt.clone() };
        Ok(receipt)
    }

    fn expect_phase(&self, action: &'static str, expected: SessionPhase) -> Result<(), SessionError> {
        let phase = self.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase { action, phase })
        }
    }

    fn fail(&mut self, reason: SessionFailure) {
        self.state = SessionState::Error { reason };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::Duration;

    use super::*;
    use crate::services::link_store::NewTest;
    use crate::test_support::{
        memory_store, memory_store_with_blobs, pdf, png, FailingBlobs, ManualClock,
    };

    async fn seeded(store: &LinkStore, duration_minutes: u32) -> TestRecord {
        store
            .create_test(NewTest {
                document: Some(pdf("exam.pdf")),
                duration_minutes,
                created_by: None,
            })
            .await
            .expect("create test")
    }

    #[tokio::test]
    async fn missing_id_goes_straight_to_error() {
        let store = memory_store(ManualClock::starting_at_epoch());
        let mut session = TestSession::new(Some("   ".to_string()));

        assert_eq!(session.load(&store).await.unwrap(), SessionPhase::Error);
        match session.state() {
            SessionState::Error { reason } => assert_eq!(*reason, SessionFailure::InvalidTestId),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_and_expired_tests_share_one_message() {
        let clock = ManualClock::starting_at_epoch();
        let store = memory_store(clock.clone());
        let test = seeded(&store, 60).await;

        let mut unknown = TestSession::new(Some("does-not-exist".to_string()));
        unknown.load(&store).await.unwrap();

        clock.advance(Duration::hours(24) + Duration::seconds(1));
        let mut expired = TestSession::new(Some(test.id));
        expired.load(&store).await.unwrap();

        for session in [unknown, expired] {
            match session.state() {
                SessionState::Error { reason } => {
                    assert_eq!(*reason, SessionFailure::NotFoundOrExpired)
                }
                other => panic!("unexpected state {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn lookup_happens_once() {
        let store = memory_store(ManualClock::starting_at_epoch());
        let test = seeded(&store, 30).await;
        let mut session = TestSession::from_link(&format!("https://exams.example.org/test/{}", test.id));

        assert_eq!(session.load(&store).await.unwrap(), SessionPhase::Ready);
        assert_eq!(session.test().map(|t| t.duration_minutes), Some(30));
        assert_eq!(session.countdown().map(|c| c.total_seconds()), Some(1800));

        let err = session.load(&store).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongPhase { phase: SessionPhase::Ready, .. }));
    }

    #[tokio::test]
    async fn only_the_first_end_signal_counts() {
        let store = memory_store(ManualClock::starting_at_epoch());
        let test = seeded(&store, 10).await;
        let mut session = TestSession::new(Some(test.id));
        session.load(&store).await.unwrap();

        assert!(session.end(CountdownEnd::EndedEarly));
        assert!(!session.end(CountdownEnd::TimeUp));
        match session.state() {
            SessionState::Ended { reason, .. } => assert_eq!(*reason, CountdownEnd::EndedEarly),
            other => panic!("unexpected state {other:?}"),
        }
        assert!(session.countdown().is_none());
    }

    #[tokio::test]
    async fn submitting_requires_an_ended_session() {
        let store = memory_store(ManualClock::starting_at_epoch());
        let test = seeded(&store, 10).await;
        let mut session = TestSession::new(Some(test.id));
        session.load(&store).await.unwrap();

        let err = session.submit(&store, vec![png("a.png")], None).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongPhase { phase: SessionPhase::Ready, .. }));
    }

    #[tokio::test]
    async fn failed_submission_can_be_retried() {
        let clock = ManualClock::starting_at_epoch();
        let blobs = Arc::new(FailingBlobs::failing_on("page2.png"));
        let store = memory_store_with_blobs(clock, blobs);
        let test = seeded(&store, 10).await;

        let mut session = TestSession::new(Some(test.id.clone()));
        session.load(&store).await.unwrap();
        session.end(CountdownEnd::TimeUp);

        let err = session
            .submit(&store, vec![png("page1.png"), png("page2.png")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Store(LinkStoreError::Transient(_))));
        assert_eq!(session.phase(), SessionPhase::Ended);

        let receipt = session
            .submit(&store, vec![png("page1.png"), png("page3.png")], Some("ana".to_string()))
            .await
            .expect("retry succeeds");
        assert_eq!(receipt.submission.test_id, test.id);
        assert_eq!(receipt.answers.len(), 2);
        assert_eq!(session.phase(), SessionPhase::Submitted);

        let err = session.submit(&store, vec![png("late.png")], None).await.unwrap_err();
        assert!(matches!(err, SessionError::WrongPhase { phase: SessionPhase::Submitted, .. }));
    }
}
