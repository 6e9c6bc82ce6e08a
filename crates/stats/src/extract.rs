use crate::model::{
    ExerciseAttempt, Overview, PerformanceTable, TrendEntry, TypePerformance, UserStats,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const OVERVIEW_HEADER: &str = "User statistics:";
pub const EXERCISES_HEADER: &str = "Latest exercises:";
pub const PERFORMANCE_HEADER: &str = "Performance by type:";
pub const TRENDS_HEADER: &str = "Recent trends:";

const NUM: &str = r"\d+(?:\.\d+)?";

// Section grammar: the header, any whitespace (blank lines included), then
// everything up to the next blank line or the end of the text.
static OVERVIEW_SECTION: Lazy<Regex> = Lazy::new(|| section(OVERVIEW_HEADER));
static EXERCISES_SECTION: Lazy<Regex> = Lazy::new(|| section(EXERCISES_HEADER));
static PERFORMANCE_SECTION: Lazy<Regex> = Lazy::new(|| section(PERFORMANCE_HEADER));
static TRENDS_SECTION: Lazy<Regex> = Lazy::new(|| section(TRENDS_HEADER));

// Line grammar, one rule per accepted list line. Rules match a prefix of the
// line; trailing annotations are ignored.
static LEVEL_LINE: Lazy<Regex> = Lazy::new(|| line(r"- Current level: (.+)"));
static AVERAGE_SCORE_LINE: Lazy<Regex> = Lazy::new(|| line(r"- Average score: (.+)"));
static BEST_SCORE_LINE: Lazy<Regex> = Lazy::new(|| line(r"- Best score: (.+)"));
static RESPONSE_TIME_LINE: Lazy<Regex> =
    Lazy::new(|| line(r"- Average response time: (.+?)\s*s"));
static EXERCISE_LINE: Lazy<Regex> =
    Lazy::new(|| line(&format!(r"- (.+?) \((Succeeded|Failed)\) in ({NUM})s")));
static PERFORMANCE_LINE: Lazy<Regex> =
    Lazy::new(|| line(&format!(r"- (.+?): ({NUM})% success rate, ({NUM})s average")));
static TREND_LINE: Lazy<Regex> =
    Lazy::new(|| line(&format!(r"- (\d+/\d+/\d+): Score ({NUM}), (\d+) sessions?")));

fn section(header: &str) -> Regex {
    let pattern = format!(
        r"(?s){}\s*(.*?)(?:\r?\n[ \t]*\r?\n|\z)",
        regex::escape(header)
    );
    Regex::new(&pattern).expect("section pattern is valid")
}

fn line(body: &str) -> Regex {
    Regex::new(&format!("^{body}")).expect("line pattern is valid")
}

/// Build a [`UserStats`] from whatever statistics sections `prompt` carries.
pub fn extract(prompt: &str) -> UserStats {
    let mut stats = UserStats::default();
    if let Some(overview) = parse_overview(prompt) {
        stats.apply_overview(overview);
    }
    stats.recent_exercises = parse_recent_exercises(prompt);
    stats.performance_by_type = parse_performance(prompt);
    stats.trends = parse_trends(prompt);

    log::debug!(
        "Extracted stats: level={} exercises={} categories={} trend_days={}",
        stats.level.is_some(),
        stats.recent_exercises.as_ref().map_or(0, Vec::len),
        stats.performance_by_type.as_ref().map_or(0, PerformanceTable::len),
        stats.trends().len()
    );
    stats
}

pub fn parse_overview(prompt: &str) -> Option<Overview> {
    let lines = list_lines(&OVERVIEW_SECTION, prompt)?;
    let mut overview = Overview::default();
    for line in lines {
        if let Some(caps) = LEVEL_LINE.captures(line) {
            let level = caps[1].trim();
            if overview.level.is_none() && !level.is_empty() {
                overview.level = Some(level.to_string());
            }
        } else if let Some(caps) = AVERAGE_SCORE_LINE.captures(line) {
            overview.average_score = overview.average_score.or_else(|| number(&caps, 1));
        } else if let Some(caps) = BEST_SCORE_LINE.captures(line) {
            overview.best_score = overview.best_score.or_else(|| number(&caps, 1));
        } else if let Some(caps) = RESPONSE_TIME_LINE.captures(line) {
            overview.average_response_time =
                overview.average_response_time.or_else(|| number(&caps, 1));
        }
    }
    Some(overview)
}

pub fn parse_recent_exercises(prompt: &str) -> Option<Vec<ExerciseAttempt>> {
    let lines = list_lines(&EXERCISES_SECTION, prompt)?;
    Some(
        lines
            .filter_map(|line| {
                let caps = EXERCISE_LINE.captures(line)?;
                Some(ExerciseAttempt {
                    exercise_type: caps[1].to_string(),
                    succeeded: &caps[2] == "Succeeded",
                    time_seconds: number(&caps, 3)?,
                })
            })
            .collect(),
    )
}

pub fn parse_performance(prompt: &str) -> Option<PerformanceTable> {
    let lines = list_lines(&PERFORMANCE_SECTION, prompt)?;
    Some(
        lines
            .filter_map(|line| {
                let caps = PERFORMANCE_LINE.captures(line)?;
                let perf = TypePerformance {
                    success_rate: number(&caps, 2)?,
                    avg_time: number(&caps, 3)?,
                };
                Some((caps[1].to_string(), perf))
            })
            .collect(),
    )
}

pub fn parse_trends(prompt: &str) -> Option<Vec<TrendEntry>> {
    let lines = list_lines(&TRENDS_SECTION, prompt)?;
    Some(
        lines
            .filter_map(|line| {
                let caps = TREND_LINE.captures(line)?;
                Some(TrendEntry {
                    date: caps[1].to_string(),
                    score: number(&caps, 2)?,
                    session_count: caps[3].parse().ok()?,
                })
            })
            .collect(),
    )
}

/// Trimmed list lines (those starting with `-`) of the first section matched
/// by `section`, or `None` when the header does not occur.
fn list_lines<'a>(section: &Regex, prompt: &'a str) -> Option<impl Iterator<Item = &'a str>> {
    let body = section.captures(prompt)?.get(1)?.as_str();
    Some(
        body.lines()
            .map(str::trim)
            .filter(|line| line.starts_with('-')),
    )
}

fn number(caps: &Captures<'_>, group: usize) -> Option<f64> {
    caps.get(group)?
        .as_str()
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL_PROMPT: &str = "[INST] You are a math tutor.
User statistics:
- Current level: 4
- Average score: 78.5
- Best score: 120
- Average response time: 3.2s

Latest exercises:
- Addition (Succeeded) in 2.5s
- Division (Failed) in 7s
- Multiplication (Succeeded) in 3.1s

Performance by type:
- Addition: 90% success rate, 2.1s average
- Division: 40% success rate, 6.5s average
- Multiplication: 90% success rate, 3s average

Recent trends:
- 12/3/2024: Score 80, 3 sessions
- 11/3/2024: Score 72.5, 1 session
- 10/3/2024: Score 60, 2 sessions

Question: How is my progression? [/INST]";

    #[test]
    fn full_block_is_extracted() {
        let stats = extract(FULL_PROMPT);
        assert_eq!(stats.level.as_deref(), Some("4"));
        assert_eq!(stats.average_score, Some(78.5));
        assert_eq!(stats.best_score, Some(120.0));
        assert_eq!(stats.average_response_time, Some(3.2));

        let exercises = stats.recent_exercises.expect("exercises");
        assert_eq!(
            exercises,
            vec![
                ExerciseAttempt {
                    exercise_type: "Addition".to_string(),
                    succeeded: true,
                    time_seconds: 2.5,
                },
                ExerciseAttempt {
                    exercise_type: "Division".to_string(),
                    succeeded: false,
                    time_seconds: 7.0,
                },
                ExerciseAttempt {
                    exercise_type: "Multiplication".to_string(),
                    succeeded: true,
                    time_seconds: 3.1,
                },
            ]
        );

        let perf = stats.performance_by_type.expect("performance");
        let names: Vec<&str> = perf.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Addition", "Division", "Multiplication"]);
        assert_eq!(perf.get("Division").map(|p| p.avg_time), Some(6.5));

        let trends = stats.trends.expect("trends");
        assert_eq!(trends.len(), 3);
        assert_eq!(trends[0].date, "12/3/2024");
        assert_eq!(trends[1].session_count, 1);
        assert_eq!(trends[2].score, 60.0);
    }

    #[test]
    fn prompt_without_sections_yields_empty_stats() {
        for prompt in ["", "Question: hello [/INST]", "Statistics: none\n- random line"] {
            assert!(extract(prompt).is_empty(), "prompt {prompt:?}");
        }
    }

    #[test]
    fn sections_are_independent() {
        let prompt = "Recent trends:\n- 1/1/2024: Score 50, 4 sessions\n";
        let stats = extract(prompt);
        assert!(stats.level.is_none());
        assert!(stats.performance_by_type.is_none());
        assert!(stats.recent_exercises.is_none());
        assert_eq!(stats.trends().len(), 1);
        assert_eq!(stats.trends()[0].session_count, 4);
    }

    #[test]
    fn malformed_lines_inside_a_section_are_skipped() {
        let prompt = "Latest exercises:
- Addition (Succeeded) in 2s
- Subtraction (Maybe) in 4s
* Division (Failed) in 5s
- Powers (Failed) in fast
- Algebra (Failed) in 9.5s
";
        let exercises = parse_recent_exercises(prompt).expect("section present");
        let summary: Vec<(&str, bool)> = exercises
            .iter()
            .map(|e| (e.exercise_type.as_str(), e.succeeded))
            .collect();
        assert_eq!(summary, vec![("Addition", true), ("Algebra", false)]);
    }

    #[test]
    fn success_flag_follows_the_marker_not_the_type_name() {
        let prompt = "Latest exercises:\n- Failed drills (Succeeded) in 1s\n- Succeeded drills (Failed) in 2s";
        let exercises = parse_recent_exercises(prompt).expect("section present");
        assert!(exercises[0].succeeded);
        assert!(!exercises[1].succeeded);
    }

    #[test]
    fn section_stops_at_blank_line() {
        let prompt = "Performance by type:\n- Addition: 50% success rate, 2s average\n\n- Division: 10% success rate, 9s average";
        let perf = parse_performance(prompt).expect("section present");
        assert_eq!(perf.len(), 1);
        assert!(perf.get("Division").is_none());
    }

    #[test]
    fn header_without_lines_is_present_but_empty() {
        assert_eq!(parse_recent_exercises("Latest exercises:\n"), Some(vec![]));
        assert_eq!(parse_recent_exercises("Latest exercises: none yet"), Some(vec![]));

        let prompt = "Latest exercises:\n\nRecent trends:\n- 2/2/2024: Score 10, 1 sessions";
        assert_eq!(parse_recent_exercises(prompt), Some(vec![]));
        assert_eq!(parse_trends(prompt).map(|t| t.len()), Some(1));
    }

    #[test]
    fn blank_lines_after_a_header_are_skipped() {
        let perf = parse_performance(
            "Performance by type:\n\n- Addition: 90% success rate, 2.1s average\n",
        )
        .expect("section present");
        assert_eq!(perf.get("Addition").map(|p| p.success_rate), Some(90.0));

        let overview = parse_overview("User statistics:\n\n- Current level: 2\n- Best score: 91\n")
            .expect("section present");
        assert_eq!(overview.level.as_deref(), Some("2"));
        assert_eq!(overview.best_score, Some(91.0));
    }

    #[test]
    fn trailing_text_after_a_list_line_is_ignored() {
        let trends = parse_trends(
            "Recent trends:\n- 12/3/2024: Score 80, 3 sessions (weekend)\n- 11/3/2024: Score 70, 1 session\n",
        )
        .expect("section present");
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].session_count, 3);

        let exercises = parse_recent_exercises("Latest exercises:\n- Addition (Succeeded) in 2.5s ✓")
            .expect("section present");
        assert_eq!(exercises.len(), 1);
        assert_eq!(exercises[0].time_seconds, 2.5);

        let overview = parse_overview("User statistics:\n- Average response time: 4s per exercise")
            .expect("section present");
        assert_eq!(overview.average_response_time, Some(4.0));
    }

    #[test]
    fn overview_fields_are_independent() {
        let prompt = "User statistics:\n- Current level: Beginner\n- Best score: 42\n- Average score: n/a\n";
        let overview = parse_overview(prompt).expect("section present");
        assert_eq!(overview.level.as_deref(), Some("Beginner"));
        assert_eq!(overview.best_score, Some(42.0));
        assert_eq!(overview.average_score, None);
        assert_eq!(overview.average_response_time, None);
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let prompt = "User statistics:\n- Average score: NaN\n- Best score: inf\n";
        let overview = parse_overview(prompt).expect("section present");
        assert_eq!(overview.average_score, None);
        assert_eq!(overview.best_score, None);
    }

    #[test]
    fn performance_keys_are_case_sensitive() {
        let prompt = "Performance by type:\n- addition: 10% success rate, 1s average\n- Addition: 20% success rate, 2s average";
        let perf = parse_performance(prompt).expect("section present");
        assert_eq!(perf.len(), 2);
        assert_eq!(perf.get("addition").map(|p| p.success_rate), Some(10.0));
    }

    #[test]
    fn crlf_prompts_are_accepted() {
        let prompt = "Recent trends:\r\n- 3/4/2024: Score 61.5, 2 sessions\r\n\r\nQuestion: x";
        let trends = parse_trends(prompt).expect("section present");
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].score, 61.5);
    }
}
