//! Ordered keyword rules that turn a question plus [`UserStats`] into a
//! templated answer. The first rule whose predicate holds answers; later
//! rules are never consulted.

use crate::error::{AnswerError, Result};
use mentor_stats::{PerformanceTable, UserStats};
use once_cell::sync::Lazy;
use regex::Regex;

pub const HELP_MESSAGE: &str = "I'm not sure I understand your question. You can ask me about:
- Your average response time
- Your scores (last, best, average)
- Your performance by exercise type
- Your progression
- Your current level";

static QUESTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Question: (.*?)\s*\[/INST\]").expect("question pattern is valid")
});

const GREETING_WORDS: &[&str] = &["hello", "hi", "hey", "greetings"];
const GREETING_PHRASES: &[&str] = &["good morning", "good evening", "how are you"];

/// The learner's literal question, isolated from the surrounding prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    lower: String,
}

impl Question {
    /// Text between `Question: ` and `[/INST]`, or the whole prompt when the
    /// markers are missing.
    pub fn isolate(prompt: &str) -> Self {
        let text = QUESTION
            .captures(prompt)
            .and_then(|caps| caps.get(1))
            .map_or(prompt, |m| m.as_str());
        Self::new(text)
    }

    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            lower: text.to_lowercase(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn mentions(&self, needle: &str) -> bool {
        self.lower.contains(needle)
    }

    fn mentions_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.mentions(needle))
    }

    fn is_greeting(&self) -> bool {
        self.mentions_any(GREETING_PHRASES)
            || self
                .lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| GREETING_WORDS.contains(&word))
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&Question, &UserStats) -> bool,
    answer: fn(&UserStats) -> Result<String>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "response_time",
        applies: |q, stats| {
            q.mentions("time") && q.mentions("average") && stats.average_response_time.is_some()
        },
        answer: response_time,
    },
    Rule {
        name: "last_score",
        applies: |q, stats| {
            q.mentions("score")
                && q.mentions_any(&["last", "last game"])
                && !stats.trends().is_empty()
        },
        answer: last_score,
    },
    Rule {
        name: "best_score",
        applies: |q, _| q.mentions("score") && q.mentions("best"),
        answer: best_score,
    },
    Rule {
        name: "score_summary",
        applies: |q, _| q.mentions("score"),
        answer: score_summary,
    },
    Rule {
        name: "performance",
        applies: |q, stats| {
            q.mentions_any(&["performance", "exercise"]) && stats.performance().is_some()
        },
        answer: performance,
    },
    Rule {
        name: "progression",
        applies: |q, stats| {
            q.mentions_any(&["progression", "evolution", "trend"]) && stats.trends().len() > 1
        },
        answer: progression,
    },
    Rule {
        name: "level",
        applies: |q, _| q.mentions("level"),
        answer: level,
    },
    Rule {
        name: "greeting",
        applies: |q, _| q.is_greeting(),
        answer: greeting,
    },
];

/// Name of the rule that answers `question`, if any.
pub fn matching_rule(question: &Question, stats: &UserStats) -> Option<&'static str> {
    find_rule(question, stats).map(|rule| rule.name)
}

/// Answer from the first matching rule; `Ok(None)` when no rule matches.
pub fn answer(question: &Question, stats: &UserStats) -> Result<Option<String>> {
    let Some(rule) = find_rule(question, stats) else {
        return Ok(None);
    };
    log::debug!("Question answered by rule '{}'", rule.name);
    (rule.answer)(stats).map(Some)
}

fn find_rule(question: &Question, stats: &UserStats) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.applies)(question, stats))
}

fn response_time(stats: &UserStats) -> Result<String> {
    let overall = stats
        .average_response_time
        .ok_or(AnswerError::missing("average_response_time"))?;
    let mut reply = format!("Your average response time is {overall}s.");
    if let Some(table) = stats.performance() {
        let details: Vec<String> = table
            .iter()
            .map(|(name, perf)| format!("{}s in {name}", perf.avg_time))
            .collect();
        reply.push_str(&format!(" In detail: {}.", details.join(", ")));
    }
    Ok(reply)
}

fn last_score(stats: &UserStats) -> Result<String> {
    let latest = stats
        .trends()
        .first()
        .ok_or(AnswerError::missing("trends"))?;
    Ok(format!(
        "In your last game, you scored {}.",
        latest.score
    ))
}

fn best_score(stats: &UserStats) -> Result<String> {
    let best = stats.best_score.ok_or(AnswerError::missing("best_score"))?;
    Ok(format!("Your best score is {best}."))
}

fn score_summary(stats: &UserStats) -> Result<String> {
    let average = stats
        .average_score
        .ok_or(AnswerError::missing("average_score"))?;
    let best = stats.best_score.ok_or(AnswerError::missing("best_score"))?;
    Ok(format!(
        "Your average score is {average}. Your best score is {best}."
    ))
}

fn performance(stats: &UserStats) -> Result<String> {
    let table: &PerformanceTable = stats
        .performance()
        .ok_or(AnswerError::missing("performance_by_type"))?;
    let details: Vec<String> = table
        .iter()
        .map(|(name, perf)| {
            format!(
                "in {name}: {}% success at {}s average",
                perf.success_rate, perf.avg_time
            )
        })
        .collect();
    let mut reply = format!("Your performance: {}.", details.join(". "));
    if let (Some((best, best_perf)), Some((worst, worst_perf))) = (table.best(), table.worst()) {
        reply.push_str(&format!(
            "\nYou excel at {best} ({}%) but could improve in {worst} ({}%).",
            best_perf.success_rate, worst_perf.success_rate
        ));
    }
    Ok(reply)
}

fn progression(stats: &UserStats) -> Result<String> {
    let trends = stats.trends();
    let (Some(newest), Some(oldest)) = (trends.first(), trends.last()) else {
        return Err(AnswerError::missing("trends"));
    };
    let diff = newest.score - oldest.score;
    let days = trends.len();
    if diff == 0.0 {
        return Ok(format!(
            "Over the last {days} days, your score has held steady at {} ({:.1} points of change).",
            newest.score,
            diff.abs()
        ));
    }
    let direction = if diff > 0.0 { "increased" } else { "decreased" };
    Ok(format!(
        "Over the last {days} days, your score has {direction} by {:.1} points, going from {} to {}.",
        diff.abs(),
        oldest.score,
        newest.score
    ))
}

fn level(stats: &UserStats) -> Result<String> {
    let level = stats.level.as_deref().ok_or(AnswerError::missing("level"))?;
    Ok(format!("You are currently at level {level}."))
}

fn greeting(stats: &UserStats) -> Result<String> {
    let level = stats.level.as_deref().ok_or(AnswerError::missing("level"))?;
    let average = stats
        .average_score
        .ok_or(AnswerError::missing("average_score"))?;
    Ok(format!(
        "Hello! I'm your math assistant. You are level {level} with an average score of {average}. How can I help you today?"
    ))
}
