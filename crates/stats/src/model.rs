/// Learner statistics rebuilt from a single prompt.
///
/// Every field is optional: `None` means the prompt did not mention it, not
/// zero. A collection that is `Some` but empty means the section header was
/// present without any readable line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub level: Option<String>,
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
    pub average_response_time: Option<f64>,
    /// Most recent attempt first, as listed in the prompt.
    pub recent_exercises: Option<Vec<ExerciseAttempt>>,
    pub performance_by_type: Option<PerformanceTable>,
    /// Index 0 is the most recent day, the last entry the oldest.
    pub trends: Option<Vec<TrendEntry>>,
}

impl UserStats {
    pub fn is_empty(&self) -> bool {
        self.level.is_none()
            && self.average_score.is_none()
            && self.best_score.is_none()
            && self.average_response_time.is_none()
            && self.recent_exercises.is_none()
            && self.performance_by_type.is_none()
            && self.trends.is_none()
    }

    pub fn trends(&self) -> &[TrendEntry] {
        self.trends.as_deref().unwrap_or_default()
    }

    /// The performance table when it holds at least one category.
    pub fn performance(&self) -> Option<&PerformanceTable> {
        self.performance_by_type
            .as_ref()
            .filter(|table| !table.is_empty())
    }

    pub(crate) fn apply_overview(&mut self, overview: Overview) {
        self.level = overview.level;
        self.average_score = overview.average_score;
        self.best_score = overview.best_score;
        self.average_response_time = overview.average_response_time;
    }
}

/// Fields of the "User statistics" section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overview {
    pub level: Option<String>,
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
    pub average_response_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseAttempt {
    pub exercise_type: String,
    pub succeeded: bool,
    pub time_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypePerformance {
    /// Percentage in `0..=100`.
    pub success_rate: f64,
    pub avg_time: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendEntry {
    /// `D/M/Y` exactly as written.
    pub date: String,
    pub score: f64,
    pub session_count: u32,
}

/// Per-category performance in first-mention order.
///
/// Keys are compared case-sensitively. Inserting an existing key replaces its
/// value and keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceTable {
    entries: Vec<(String, TypePerformance)>,
}

impl PerformanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, exercise_type: impl Into<String>, perf: TypePerformance) {
        let exercise_type = exercise_type.into();
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| *existing == exercise_type)
        {
            Some((_, slot)) => *slot = perf,
            None => self.entries.push((exercise_type, perf)),
        }
    }

    pub fn get(&self, exercise_type: &str) -> Option<&TypePerformance> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == exercise_type)
            .map(|(_, perf)| perf)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypePerformance)> {
        self.entries.iter().map(|(name, perf)| (name.as_str(), perf))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest success rate; the first listed category wins a tie.
    pub fn best(&self) -> Option<(&str, &TypePerformance)> {
        self.pick(|candidate, current| candidate > current)
    }

    /// Lowest success rate; the first listed category wins a tie.
    pub fn worst(&self) -> Option<(&str, &TypePerformance)> {
        self.pick(|candidate, current| candidate < current)
    }

    fn pick(&self, replaces: impl Fn(f64, f64) -> bool) -> Option<(&str, &TypePerformance)> {
        let mut chosen: Option<(&str, &TypePerformance)> = None;
        for (name, perf) in self.iter() {
            match chosen {
                Some((_, current)) if !replaces(perf.success_rate, current.success_rate) => {}
                _ => chosen = Some((name, perf)),
            }
        }
        chosen
    }
}

impl<S: Into<String>> FromIterator<(S, TypePerformance)> for PerformanceTable {
    fn from_iter<I: IntoIterator<Item = (S, TypePerformance)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, perf) in iter {
            table.insert(name, perf);
        }
        table
    }
}
