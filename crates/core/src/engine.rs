//! Quiz progression: navigation, answers, confirmation, ordering and scoring.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::model::state::shuffled_layout;
use crate::model::{AnswerOption, Question, QuestionBank, QuestionId, Score, SessionState};

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What `confirm_answer` did. The confirmation is recorded in both
/// `Confirmed*` cases; an unselected question simply scores as incorrect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    ConfirmedWithoutSelection,
    UnknownQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished,
    /// Nothing changed; these questions are still unconfirmed, in bank order.
    NeedsReview { unanswered: Vec<QuestionId> },
}

/// Per-question marker for a navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionStatus {
    Unanswered,
    Selected,
    Confirmed,
    Correct,
    Incorrect,
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// A question with its options in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView<'a> {
    pub question: &'a Question,
    pub options: Vec<&'a AnswerOption>,
}

impl QuestionView<'_> {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.question.id()
    }
}

/// One row of the post-results "view all" listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem<'a> {
    pub question: &'a Question,
    pub user_answer: Option<&'a str>,
    pub is_correct: bool,
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Owns the progress of a single quiz attempt over a shared, immutable bank.
///
/// Every mutation goes through these methods. None of them fail: bad input is
/// clamped or ignored so `order` always stays a permutation of the bank.
pub struct QuizEngine {
    bank: Arc<QuestionBank>,
    state: SessionState,
    rng: StdRng,
}

impl QuizEngine {
    /// Default state: bank order, nothing answered, randomization off.
    #[must_use]
    pub fn new(bank: Arc<QuestionBank>) -> Self {
        Self::with_rng(bank, StdRng::from_os_rng())
    }

    #[must_use]
    pub fn with_rng(bank: Arc<QuestionBank>, rng: StdRng) -> Self {
        let state = SessionState::canonical(&bank);
        Self { bank, state, rng }
    }

    /// Rebuild from a persisted blob, falling back to defaults if it is unreadable.
    #[must_use]
    pub fn restore(bank: Arc<QuestionBank>, raw: &str) -> Self {
        Self::restore_with_rng(bank, raw, StdRng::from_os_rng())
    }

    #[must_use]
    pub fn restore_with_rng(bank: Arc<QuestionBank>, raw: &str, mut rng: StdRng) -> Self {
        let state = match SessionState::from_json(raw) {
            Ok(mut state) => {
                if state.reconcile(&bank, &mut rng) {
                    warn!("persisted quiz state did not match the question bank; repaired");
                }
                state
            }
            Err(err) => {
                warn!(error = %err, "discarding unreadable quiz state");
                SessionState::canonical(&bank)
            }
        };
        Self { bank, state, rng }
    }

    #[must_use]
    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Serialize the state to its persisted form.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_persisted(&self) -> Result<String, serde_json::Error> {
        self.state.to_json()
    }

    // ─── answers ───────────────────────────────────────────────────────────────

    /// Record `label` as the answer for `id`, replacing any earlier choice.
    ///
    /// Confirmed answers are overwritten too; callers are expected not to
    /// offer re-selection after confirming. Returns false (and changes nothing)
    /// when `id` is not in the bank or `label` is not one of its options.
    pub fn select_answer(&mut self, id: QuestionId, label: &str) -> bool {
        let Some(question) = self.bank.get(id) else {
            warn!(%id, "ignoring answer for unknown question");
            return false;
        };
        if !question.has_option(label) {
            warn!(%id, label, "ignoring answer with unknown label");
            return false;
        }
        if self.state.confirmed_answers.contains(&id) {
            debug!(%id, "overwriting a confirmed answer");
        }
        self.state.answers.insert(id, label.to_string());
        true
    }

    pub fn confirm_answer(&mut self, id: QuestionId) -> ConfirmOutcome {
        if !self.bank.contains(id) {
            warn!(%id, "ignoring confirmation for unknown question");
            return ConfirmOutcome::UnknownQuestion;
        }
        self.state.confirmed_answers.insert(id);
        if self.state.answers.contains_key(&id) {
            ConfirmOutcome::Confirmed
        } else {
            debug!(%id, "confirmed without a selection");
            ConfirmOutcome::ConfirmedWithoutSelection
        }
    }

    #[must_use]
    pub fn is_answer_confirmed(&self, id: QuestionId) -> bool {
        self.state.confirmed_answers.contains(&id)
    }

    #[must_use]
    pub fn answer_for(&self, id: QuestionId) -> Option<&str> {
        self.state.answers.get(&id).map(String::as_str)
    }

    #[must_use]
    pub fn confirmed_count(&self) -> usize {
        self.state.confirmed_answers.len()
    }

    // ─── navigation ────────────────────────────────────────────────────────────

    pub fn advance(&mut self) {
        self.jump_to_index(self.state.current_index.saturating_add(1));
    }

    pub fn retreat(&mut self) {
        self.jump_to_index(self.state.current_index.saturating_sub(1));
    }

    /// Move to `index`, clamped to the last position.
    pub fn jump_to_index(&mut self, index: usize) {
        let last = self.state.order.len().saturating_sub(1);
        self.state.current_index = index.min(last);
    }

    /// Move to wherever `id` sits in the current order, or to the start if absent.
    pub fn jump_to_question_id(&mut self, id: QuestionId) {
        self.state.current_index = self
            .state
            .order
            .iter()
            .position(|candidate| *candidate == id)
            .unwrap_or(0);
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.state.order.len()
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.state.current_index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.state.current_index + 1 >= self.state.order.len()
    }

    /// The question at the current position, options in display order.
    #[must_use]
    pub fn current_question(&self) -> QuestionView<'_> {
        // The bank is never empty and `order` is always a permutation of it.
        let question = self
            .state
            .order
            .get(self.state.current_index)
            .and_then(|id| self.bank.get(*id))
            .unwrap_or(&self.bank.questions()[0]);
        self.view(question)
    }

    fn view<'a>(&'a self, question: &'a Question) -> QuestionView<'a> {
        let options = match self.state.option_order.get(&question.id()) {
            Some(perm) => perm
                .iter()
                .filter_map(|&idx| question.options().get(idx))
                .collect(),
            None => question.options().iter().collect(),
        };
        QuestionView { question, options }
    }

    // ─── completion ────────────────────────────────────────────────────────────

    /// Ids, in bank order, that have not been confirmed.
    #[must_use]
    pub fn list_unanswered(&self) -> Vec<QuestionId> {
        self.bank
            .questions()
            .iter()
            .map(Question::id)
            .filter(|id| !self.state.confirmed_answers.contains(id))
            .collect()
    }

    /// Show results. Idempotent; answers are kept.
    pub fn finish(&mut self) {
        self.state.show_results = true;
    }

    /// Finish only if every question is confirmed.
    pub fn request_finish(&mut self) -> FinishOutcome {
        let unanswered = self.list_unanswered();
        if unanswered.is_empty() {
            self.finish();
            FinishOutcome::Finished
        } else {
            FinishOutcome::NeedsReview { unanswered }
        }
    }

    /// Jump to the first unconfirmed question. Returns its id, if any.
    pub fn review_first_unanswered(&mut self) -> Option<QuestionId> {
        let first = self.list_unanswered().into_iter().next()?;
        self.jump_to_question_id(first);
        Some(first)
    }

    #[must_use]
    pub fn show_results(&self) -> bool {
        self.state.show_results
    }

    pub fn set_review_mode(&mut self, enabled: bool) {
        self.state.review_mode = enabled;
    }

    // ─── ordering ──────────────────────────────────────────────────────────────

    /// Start over. Randomized sessions get a fresh shuffle; the preference itself survives.
    pub fn reset(&mut self) {
        self.state = if self.state.is_randomized {
            SessionState::randomized(&self.bank, &mut self.rng)
        } else {
            SessionState::canonical(&self.bank)
        };
        debug!(randomized = self.state.is_randomized, "quiz reset");
    }

    /// Switch randomization, reshuffling (or restoring bank order) and
    /// returning to the first position. Answers and confirmations are kept.
    pub fn set_randomization(&mut self, enabled: bool) {
        if enabled {
            let (order, option_order) = shuffled_layout(&self.bank, &mut self.rng);
            self.state.order = order;
            self.state.option_order = option_order;
        } else {
            self.state.order = self.bank.ids();
            self.state.option_order.clear();
        }
        self.state.is_randomized = enabled;
        self.state.current_index = 0;
        debug!(enabled, "randomization toggled");
    }

    #[must_use]
    pub fn is_randomized(&self) -> bool {
        self.state.is_randomized
    }

    // ─── results ───────────────────────────────────────────────────────────────

    /// Grade every bank question against its raw answer; confirmation is not required.
    #[must_use]
    pub fn score(&self) -> Score {
        let correct = self
            .bank
            .questions()
            .iter()
            .filter(|q| self.answer_for(q.id()).is_some_and(|a| q.is_correct(a)))
            .count();
        let total = self.bank.len();
        Score::new(
            u32::try_from(correct).unwrap_or(u32::MAX),
            u32::try_from(total).unwrap_or(u32::MAX),
        )
    }

    /// Status of each bank question, in bank order.
    #[must_use]
    pub fn question_statuses(&self) -> Vec<(QuestionId, QuestionStatus)> {
        self.bank
            .questions()
            .iter()
            .map(|q| (q.id(), self.status_of(q)))
            .collect()
    }

    fn status_of(&self, question: &Question) -> QuestionStatus {
        let id = question.id();
        let confirmed = self.state.confirmed_answers.contains(&id);
        let answer = self.answer_for(id);

        if self.state.show_results {
            return match answer {
                Some(a) if question.is_correct(a) => QuestionStatus::Correct,
                _ if confirmed => QuestionStatus::Incorrect,
                _ => QuestionStatus::Unanswered,
            };
        }

        match (confirmed, answer) {
            (true, _) => QuestionStatus::Confirmed,
            (false, Some(_)) => QuestionStatus::Selected,
            (false, None) => QuestionStatus::Unanswered,
        }
    }

    /// Every question with the user's answer, in bank order.
    #[must_use]
    pub fn review_items(&self) -> Vec<ReviewItem<'_>> {
        self.bank
            .questions()
            .iter()
            .map(|question| {
                let user_answer = self.answer_for(question.id());
                ReviewItem {
                    question,
                    user_answer,
                    is_correct: user_answer.is_some_and(|a| question.is_correct(a)),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, ScoreBand};

    fn bank(n: u64) -> Arc<QuestionBank> {
        let labels = ["A", "B", "C", "D"];
        let drafts = (1..=n)
            .map(|id| QuestionDraft {
                id,
                text: format!("Question {id}"),
                options: labels
                    .iter()
                    .map(|l| AnswerOption::new(*l, format!("option {l}")))
                    .collect(),
                correct_answer: labels[((id - 1) % 4) as usize].to_string(),
                tip: None,
                title: None,
            })
            .collect();
        Arc::new(QuestionBank::from_drafts(drafts).unwrap())
    }

    fn engine(n: u64, seed: u64) -> QuizEngine {
        QuizEngine::with_rng(bank(n), StdRng::seed_from_u64(seed))
    }

    fn ids(raw: &[u64]) -> Vec<QuestionId> {
        raw.iter().copied().map(QuestionId::new).collect()
    }

    fn assert_permutation(engine: &QuizEngine) {
        let mut sorted = engine.state().order().to_vec();
        sorted.sort();
        assert_eq!(sorted, engine.bank().ids());
    }

    #[test]
    fn starts_in_bank_order() {
        let engine = engine(5, 1);
        assert_eq!(engine.state().order(), ids(&[1, 2, 3, 4, 5]).as_slice());
        assert_eq!(engine.current_index(), 0);
        assert!(!engine.is_randomized());
        assert!(engine.state().option_order().is_empty());
        assert_eq!(engine.current_question().id(), QuestionId::new(1));
    }

    #[test]
    fn three_question_scenario() {
        let mut engine = engine(3, 1);
        let (q1, q2) = (QuestionId::new(1), QuestionId::new(2));

        assert!(engine.select_answer(q1, "A"));
        assert_eq!(engine.confirm_answer(q1), ConfirmOutcome::Confirmed);
        assert!(engine.select_answer(q2, "B"));

        assert_eq!(engine.list_unanswered(), ids(&[2, 3]));
        let score = engine.score();
        assert_eq!(score.correct(), 2);
        assert_eq!(score.total(), 3);
        assert_eq!(score.percentage(), 67);
    }

    #[test]
    fn reset_clears_score() {
        let mut engine = engine(4, 2);
        for q in engine.bank().questions().to_vec() {
            engine.select_answer(q.id(), q.correct_answer());
            engine.confirm_answer(q.id());
        }
        assert_eq!(engine.score().correct(), 4);

        engine.reset();
        assert_eq!(engine.score().correct(), 0);
        assert!(engine.state().answers().is_empty());
        assert!(engine.state().confirmed_answers().is_empty());
        assert!(!engine.show_results());
    }

    #[test]
    fn reset_keeps_randomization_and_reshuffles() {
        let mut engine = engine(30, 3);
        engine.set_randomization(true);
        let before = engine.state().order().to_vec();
        engine.reset();
        assert!(engine.is_randomized());
        assert_eq!(engine.state().option_order().len(), 30);
        assert_ne!(engine.state().order(), before.as_slice());
        assert_permutation(&engine);
    }

    #[test]
    fn toggling_randomization_twice_restores_canonical_order() {
        let mut engine = engine(12, 4);
        let canonical = engine.state().order().to_vec();
        engine.select_answer(QuestionId::new(5), "A");

        engine.set_randomization(true);
        assert_permutation(&engine);
        engine.set_randomization(false);

        assert_eq!(engine.state().order(), canonical.as_slice());
        assert!(engine.state().option_order().is_empty());
        assert_eq!(engine.answer_for(QuestionId::new(5)), Some("A"));
    }

    #[test]
    fn randomization_resets_position_but_keeps_answers() {
        let mut engine = engine(6, 5);
        engine.jump_to_index(4);
        engine.select_answer(QuestionId::new(2), "B");
        engine.confirm_answer(QuestionId::new(2));

        engine.set_randomization(true);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.is_answer_confirmed(QuestionId::new(2)));
    }

    #[test]
    fn randomizing_a_large_bank_always_changes_order() {
        let bank = bank(71);
        let canonical = bank.ids();
        for seed in 0..1000 {
            let mut engine = QuizEngine::with_rng(Arc::clone(&bank), StdRng::seed_from_u64(seed));
            engine.set_randomization(true);
            let order = engine.state().order();
            assert_ne!(order, canonical.as_slice(), "seed {seed} kept bank order");
            let mut sorted = order.to_vec();
            sorted.sort();
            assert_eq!(sorted, canonical);
        }
    }

    #[test]
    fn jump_to_question_id_lands_on_that_question() {
        let mut engine = engine(15, 6);
        engine.set_randomization(true);
        for id in engine.state().order().to_vec() {
            engine.jump_to_question_id(id);
            assert_eq!(engine.current_question().id(), id);
        }
    }

    #[test]
    fn jump_to_unknown_id_falls_back_to_start() {
        let mut engine = engine(3, 7);
        engine.jump_to_index(2);
        engine.jump_to_question_id(QuestionId::new(99));
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn navigation_saturates_at_both_ends() {
        let mut engine = engine(4, 8);
        engine.retreat();
        assert_eq!(engine.current_index(), 0);
        assert!(engine.is_first());

        engine.jump_to_index(3);
        engine.advance();
        assert_eq!(engine.current_index(), 3);
        assert!(engine.is_last());

        engine.jump_to_index(usize::MAX);
        assert_eq!(engine.current_index(), 3);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut engine = engine(3, 9);
        engine.select_answer(QuestionId::new(1), "A");
        engine.confirm_answer(QuestionId::new(1));
        let answers = engine.state().answers().clone();
        let confirmed = engine.state().confirmed_answers().clone();

        engine.finish();
        engine.finish();
        assert!(engine.show_results());
        assert_eq!(engine.state().answers(), &answers);
        assert_eq!(engine.state().confirmed_answers(), &confirmed);
    }

    #[test]
    fn request_finish_requires_every_confirmation() {
        let mut engine = engine(2, 10);
        engine.select_answer(QuestionId::new(1), "A");
        engine.confirm_answer(QuestionId::new(1));

        assert_eq!(
            engine.request_finish(),
            FinishOutcome::NeedsReview {
                unanswered: ids(&[2])
            }
        );
        assert!(!engine.show_results());

        assert_eq!(engine.review_first_unanswered(), Some(QuestionId::new(2)));
        assert_eq!(engine.current_question().id(), QuestionId::new(2));

        engine.select_answer(QuestionId::new(2), "C");
        engine.confirm_answer(QuestionId::new(2));
        assert_eq!(engine.request_finish(), FinishOutcome::Finished);
        assert!(engine.show_results());
        assert_eq!(engine.review_first_unanswered(), None);
    }

    #[test]
    fn confirm_without_selection_is_recorded_and_scores_incorrect() {
        let mut engine = engine(2, 11);
        assert_eq!(
            engine.confirm_answer(QuestionId::new(1)),
            ConfirmOutcome::ConfirmedWithoutSelection
        );
        assert!(engine.is_answer_confirmed(QuestionId::new(1)));
        assert_eq!(engine.score().correct(), 0);
        assert_eq!(engine.list_unanswered(), ids(&[2]));
    }

    #[test]
    fn bad_input_is_ignored() {
        let mut engine = engine(2, 12);
        assert!(!engine.select_answer(QuestionId::new(42), "A"));
        assert!(!engine.select_answer(QuestionId::new(1), "Z"));
        assert_eq!(
            engine.confirm_answer(QuestionId::new(42)),
            ConfirmOutcome::UnknownQuestion
        );
        assert!(engine.state().answers().is_empty());
        assert!(engine.state().confirmed_answers().is_empty());
    }

    #[test]
    fn select_overwrites_even_after_confirmation() {
        let mut engine = engine(1, 13);
        let id = QuestionId::new(1);
        engine.select_answer(id, "B");
        engine.confirm_answer(id);
        engine.select_answer(id, "A");
        assert_eq!(engine.answer_for(id), Some("A"));
    }

    #[test]
    fn current_question_uses_option_order() {
        let mut engine = engine(3, 14);
        engine.set_randomization(true);
        let view = engine.current_question();
        let perm = &engine.state().option_order()[&view.id()];
        let labels: Vec<&str> = view.options.iter().map(|o| o.label.as_str()).collect();
        let expected: Vec<&str> = perm
            .iter()
            .map(|&i| view.question.options()[i].label.as_str())
            .collect();
        assert_eq!(labels, expected);
        assert_eq!(view.options.len(), 4);
    }

    #[test]
    fn persisted_round_trip_restores_identical_state() {
        let bank = bank(8);
        let mut engine = QuizEngine::with_rng(Arc::clone(&bank), StdRng::seed_from_u64(15));
        engine.set_randomization(true);
        engine.select_answer(QuestionId::new(3), "C");
        engine.confirm_answer(QuestionId::new(3));
        engine.jump_to_index(5);
        engine.set_review_mode(true);

        let raw = engine.to_persisted().unwrap();
        let restored = QuizEngine::restore_with_rng(bank, &raw, StdRng::seed_from_u64(99));
        assert_eq!(restored.state(), engine.state());
    }

    #[test]
    fn garbage_blob_restores_defaults() {
        let bank = bank(5);
        let engine = QuizEngine::restore_with_rng(
            Arc::clone(&bank),
            "{not json",
            StdRng::seed_from_u64(16),
        );
        assert_eq!(engine.state(), &SessionState::canonical(&bank));
        assert_permutation(&engine);
    }

    #[test]
    fn stale_blob_is_repaired_against_bank() {
        let bank = bank(5);
        let engine = QuizEngine::restore_with_rng(
            bank,
            r#"{"isRandomized": true, "order": [1, 2], "currentQuestionIndex": 3}"#,
            StdRng::seed_from_u64(17),
        );
        assert!(engine.is_randomized());
        assert_permutation(&engine);
        assert_eq!(engine.current_index(), 3);
    }

    #[test]
    fn statuses_before_and_after_results() {
        let mut engine = engine(4, 18);
        engine.select_answer(QuestionId::new(1), "A"); // correct, confirmed
        engine.confirm_answer(QuestionId::new(1));
        engine.select_answer(QuestionId::new(2), "A"); // wrong, confirmed
        engine.confirm_answer(QuestionId::new(2));
        engine.select_answer(QuestionId::new(3), "C"); // correct, unconfirmed

        let before: Vec<_> = engine.question_statuses().into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            before,
            vec![
                QuestionStatus::Confirmed,
                QuestionStatus::Confirmed,
                QuestionStatus::Selected,
                QuestionStatus::Unanswered,
            ]
        );

        engine.finish();
        let after: Vec<_> = engine.question_statuses().into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            after,
            vec![
                QuestionStatus::Correct,
                QuestionStatus::Incorrect,
                QuestionStatus::Correct,
                QuestionStatus::Unanswered,
            ]
        );
    }

    #[test]
    fn review_items_pair_answers_with_correctness() {
        let mut engine = engine(2, 19);
        engine.select_answer(QuestionId::new(2), "D");
        let items = engine.review_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].user_answer, None);
        assert!(!items[0].is_correct);
        assert_eq!(items[1].user_answer, Some("D"));
        assert!(!items[1].is_correct);
        assert_eq!(engine.score().band(), ScoreBand::NeedsPractice);
    }
}
