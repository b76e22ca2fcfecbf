//! Session Report
//!
//! Turns the session ledger into the human-readable report that is published
//! when the session shuts down. Generating the report has no side effects;
//! delivering it is the caller's job.

use crate::generic_types::Participants;
use crate::ledger::{QuizScore, SessionLedger};
use chrono::{DateTime, Local};
use std::fmt;

/// Line used when no topic was recorded during the session.
pub const GENERAL_OVERVIEW: &str = "General overview of cells";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceTier {
    Excellent,
    Good,
    NeedsImprovement,
}

impl PerformanceTier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            80.. => Self::Excellent,
            60..=79 => Self::Good,
            _ => Self::NeedsImprovement,
        }
    }
}

impl fmt::Display for PerformanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::NeedsImprovement => write!(f, "needs improvement"),
        }
    }
}

/// Renders the end-of-session report as of `now`.
pub fn generate_summary(
    ledger: &SessionLedger,
    participants: &Participants,
    now: DateTime<Local>,
) -> String {
    let minutes = ledger.elapsed_minutes(now);
    let mut lines = vec![
        "STUDY SESSION SUMMARY".to_string(),
        format!("Date: {}", ledger.started_at.format("%B %-d, %Y")),
        format!(
            "Duration: {} minute{}",
            minutes,
            if minutes == 1 { "" } else { "s" }
        ),
        format!(
            "Participants: {} and {}",
            participants.user_name, participants.agent_name
        ),
        String::new(),
        "TOPICS COVERED".to_string(),
    ];

    if ledger.topics_covered.is_empty() {
        lines.push(format!("- {}", GENERAL_OVERVIEW));
    } else {
        lines.extend(ledger.topics_covered.iter().map(|t| format!("- {}", t)));
    }

    if !ledger.key_learnings.is_empty() {
        lines.push(String::new());
        lines.push("KEY LEARNINGS".to_string());
        lines.extend(
            ledger
                .key_learnings
                .iter()
                .enumerate()
                .map(|(i, l)| format!("{}. {}", i + 1, l)),
        );
    }

    if ledger.quiz_taken {
        lines.push(String::new());
        lines.push("QUIZ RESULTS".to_string());
        match ledger.quiz_score {
            Some(score) => {
                let percentage = score.percentage();
                lines.push(format!(
                    "Score: {} out of {} ({}%)",
                    score.correct, score.total, percentage
                ));
                lines.push(format!(
                    "Performance: {}",
                    PerformanceTier::from_percentage(percentage)
                ));
            }
            None => lines.push("Quiz: started but not completed".to_string()),
        }
    }

    lines.push(String::new());
    lines.push("RECOMMENDATIONS".to_string());
    lines.extend(recommendations(ledger, participants));

    lines.join("\n")
}

fn recommendations(ledger: &SessionLedger, participants: &Participants) -> Vec<String> {
    let mut out = vec![format!(
        "- {} should review today's notes before the next session.",
        participants.user_name
    )];
    match (ledger.quiz_taken, ledger.quiz_score) {
        (_, Some(score)) if !score.is_perfect() => out.push(remediation(&score)),
        (_, Some(_)) => out.push("- Great quiz result! Move on to the next topic.".to_string()),
        (true, None) => out.push("- Finish the quiz next time to check understanding.".to_string()),
        (false, None) => out.push("- Try the quiz next session to test what was learned.".to_string()),
    }
    out
}

fn remediation(score: &QuizScore) -> String {
    let missed = score.total - score.correct;
    format!(
        "- Go over the {} missed quiz question{}, then try the quiz again.",
        missed,
        if missed == 1 { "" } else { "s" }
    )
}
