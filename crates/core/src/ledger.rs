use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Final quiz result as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub correct: u32,
    pub total: u32,
}

impl QuizScore {
    /// Percentage of correct answers, rounded to the nearest integer.
    ///
    /// A quiz with no questions scores zero.
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (f64::from(self.correct) / f64::from(self.total) * 100.0).round() as u32
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// What happened during one study session.
///
/// The ledger is only written to by the session tools and is read once, when
/// the session report is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLedger {
    pub started_at: DateTime<Local>,
    /// Topics in the order they were first covered. No duplicates.
    pub topics_covered: Vec<String>,
    /// Key learnings in the order they were recorded. Duplicates are kept.
    pub key_learnings: Vec<String>,
    pub quiz_score: Option<QuizScore>,
    pub quiz_taken: bool,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            topics_covered: Vec::new(),
            key_learnings: Vec::new(),
            quiz_score: None,
            quiz_taken: false,
        }
    }

    /// Records a topic unless it is already in the ledger.
    ///
    /// Returns `true` if the topic was new.
    pub fn record_topic(&mut self, topic: &str) -> bool {
        if self.topics_covered.iter().any(|t| t == topic) {
            return false;
        }
        self.topics_covered.push(topic.to_string());
        true
    }

    pub fn record_learning(&mut self, learning: &str) {
        self.key_learnings.push(learning.to_string());
    }

    /// Stores the latest quiz score, replacing any earlier one.
    ///
    /// A score with more correct answers than questions is clamped to the
    /// number of questions. Recording a score also marks the quiz as taken.
    pub fn record_quiz_score(&mut self, correct: u32, total: u32) -> QuizScore {
        if correct > total {
            warn!(correct, total, "Quiz score has more correct answers than questions, clamping.");
        }
        let score = QuizScore {
            correct: correct.min(total),
            total,
        };
        self.quiz_score = Some(score);
        self.quiz_taken = true;
        score
    }

    pub fn mark_quiz_taken(&mut self) {
        self.quiz_taken = true;
    }

    /// Whole minutes elapsed between the session start and `now`, rounded.
    pub fn elapsed_minutes(&self, now: DateTime<Local>) -> i64 {
        let seconds = (now - self.started_at).num_seconds().max(0);
        (seconds as f64 / 60.0).round() as i64
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_topics_are_unique_and_ordered() {
        let mut ledger = SessionLedger::new();
        assert!(ledger.record_topic("mitochondria"));
        assert!(ledger.record_topic("nucleus"));
        assert!(!ledger.record_topic("mitochondria"));
        assert_eq!(ledger.topics_covered, vec!["mitochondria", "nucleus"]);
    }

    #[test]
    fn test_learnings_keep_duplicates() {
        let mut ledger = SessionLedger::new();
        ledger.record_learning("x");
        ledger.record_learning("x");
        assert_eq!(ledger.key_learnings.len(), 2);
    }

    #[test]
    fn test_quiz_score_last_write_wins() {
        let mut ledger = SessionLedger::new();
        ledger.record_quiz_score(3, 10);
        ledger.record_quiz_score(7, 10);
        assert_eq!(ledger.quiz_score, Some(QuizScore { correct: 7, total: 10 }));
        assert!(ledger.quiz_taken);
    }

    #[test]
    fn test_quiz_score_is_clamped() {
        let mut ledger = SessionLedger::new();
        let score = ledger.record_quiz_score(12, 10);
        assert_eq!(score, QuizScore { correct: 10, total: 10 });
        assert!(score.is_perfect());
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(QuizScore { correct: 7, total: 10 }.percentage(), 70);
        assert_eq!(QuizScore { correct: 2, total: 3 }.percentage(), 67);
        assert_eq!(QuizScore { correct: 1, total: 8 }.percentage(), 13);
        assert_eq!(QuizScore { correct: 0, total: 0 }.percentage(), 0);
        assert!(!QuizScore { correct: 0, total: 0 }.is_perfect());
    }

    #[test]
    fn test_elapsed_minutes_rounds() {
        let start = Local::now();
        let ledger = SessionLedger::started_at(start);
        assert_eq!(ledger.elapsed_minutes(start), 0);
        assert_eq!(ledger.elapsed_minutes(start + Duration::seconds(89)), 1);
        assert_eq!(ledger.elapsed_minutes(start + Duration::seconds(90)), 2);
        assert_eq!(ledger.elapsed_minutes(start + Duration::minutes(25)), 25);
        assert_eq!(ledger.elapsed_minutes(start - Duration::minutes(5)), 0);
    }
}
