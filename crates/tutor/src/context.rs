use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct Topic {
    keywords: &'static [&'static str],
    weight: f64,
}

const GENERAL_STATS: Topic = Topic {
    keywords: &["score", "performance", "overall", "average", "total", "accuracy"],
    weight: 1.5,
};

const TOPICS: &[Topic] = &[
    GENERAL_STATS,
    // last game
    Topic {
        keywords: &["last game", "last score", "last session", "last time"],
        weight: 2.0,
    },
    // exercise types
    Topic {
        keywords: &["addition", "subtraction", "multiplication", "division", "power", "algebra"],
        weight: 1.8,
    },
    // trends
    Topic {
        keywords: &["trend", "progression", "improvement", "evolution", "comparison"],
        weight: 1.3,
    },
    // cognitive
    Topic {
        keywords: &["memory", "focus", "speed", "response time", "fatigue", "stress"],
        weight: 1.6,
    },
];

/// Read-only knowledge corpus: every `*.txt` file of one directory.
///
/// The directory is read on first use and kept for the life of the process.
pub struct ContextLoader {
    dir: PathBuf,
    fragments: OnceCell<Arc<[String]>>,
}

impl ContextLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fragments: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Trimmed fragments ordered by file name.
    pub fn load(&self) -> Arc<[String]> {
        self.fragments
            .get_or_init(|| {
                let fragments = read_corpus(&self.dir);
                log::info!(
                    "Loaded {} context fragments from {}",
                    fragments.len(),
                    self.dir.display()
                );
                fragments.into()
            })
            .clone()
    }

    /// Fragments to send along with `question`.
    ///
    /// Without a limit (or with one covering the whole corpus) every fragment
    /// is returned in load order. Otherwise the `limit` most relevant ones are
    /// returned, best first, ties kept in load order.
    pub fn select(&self, question: &str, limit: Option<usize>) -> Vec<String> {
        let fragments = self.load();
        match limit {
            Some(limit) if limit < fragments.len() => rank(&fragments, question)
                .into_iter()
                .take(limit)
                .map(|idx| fragments[idx].clone())
                .collect(),
            _ => fragments.to_vec(),
        }
    }
}

fn read_corpus(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Context corpus {} unavailable: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(err) => {
                log::warn!("Skipping unreadable entry in {}: {err}", dir.display());
                None
            }
        })
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    paths
        .into_iter()
        .filter_map(|path| match fs::read_to_string(&path) {
            Ok(raw) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(err) => {
                log::warn!("Skipping context fragment {}: {err}", path.display());
                None
            }
        })
        .collect()
}

/// Fragment indices ordered by descending relevance to `question`.
fn rank(fragments: &[String], question: &str) -> Vec<usize> {
    let question = question.to_lowercase();
    let topics = topics_for(&question);
    let mut scored: Vec<(usize, f64)> = fragments
        .iter()
        .enumerate()
        .map(|(idx, fragment)| (idx, relevance(&fragment.to_lowercase(), &question, &topics)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

fn topics_for(question: &str) -> Vec<&'static Topic> {
    let matched: Vec<&'static Topic> = TOPICS
        .iter()
        .filter(|topic| topic.keywords.iter().any(|kw| question.contains(kw)))
        .collect();
    if matched.is_empty() {
        vec![&TOPICS[0]]
    } else {
        matched
    }
}

fn relevance(fragment: &str, question: &str, topics: &[&Topic]) -> f64 {
    if question.trim().is_empty() {
        return 0.0;
    }
    let word_hits: usize = question
        .split_whitespace()
        .map(|word| fragment.matches(word).count())
        .sum();
    let exact_hits = fragment.matches(question).count();
    let topic_hits: f64 = topics
        .iter()
        .flat_map(|topic| {
            topic
                .keywords
                .iter()
                .map(move |kw| fragment.matches(kw).count() as f64 * topic.weight)
        })
        .sum();
    word_hits as f64 + 2.0 * exact_hits as f64 + topic_hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn corpus(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(name), body).unwrap();
        }
        dir
    }

    #[test]
    fn loads_txt_files_sorted_and_trimmed() {
        let dir = corpus(&[
            ("b.txt", "  second fragment \n"),
            ("a.txt", "first fragment"),
            ("notes.md", "ignored"),
            ("empty.txt", "   \n"),
        ]);
        fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let loader = ContextLoader::new(dir.path());
        assert_eq!(
            loader.load().to_vec(),
            vec!["first fragment".to_string(), "second fragment".to_string()]
        );
    }

    #[test]
    fn missing_directory_is_an_empty_corpus() {
        let loader = ContextLoader::new("/definitely/not/a/corpus");
        assert!(loader.load().is_empty());
        assert!(loader.select("anything", Some(2)).is_empty());
    }

    #[test]
    fn corpus_is_cached_after_first_load() {
        let dir = corpus(&[("a.txt", "fractions")]);
        let loader = ContextLoader::new(dir.path());
        assert_eq!(loader.load().len(), 1);
        fs::write(dir.path().join("b.txt"), "decimals").unwrap();
        assert_eq!(loader.load().len(), 1);
    }

    #[test]
    fn unreadable_fragment_is_skipped() {
        let dir = corpus(&[("a.txt", "kept")]);
        fs::write(dir.path().join("b.txt"), [0xff, 0xfe, 0x00]).unwrap();
        let loader = ContextLoader::new(dir.path());
        assert_eq!(loader.load().to_vec(), vec!["kept".to_string()]);
    }

    #[test]
    fn select_without_limit_returns_everything_in_order() {
        let dir = corpus(&[("1.txt", "alpha"), ("2.txt", "beta"), ("3.txt", "gamma")]);
        let loader = ContextLoader::new(dir.path());
        assert_eq!(loader.select("beta", None), vec!["alpha", "beta", "gamma"]);
        assert_eq!(loader.select("beta", Some(5)), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn select_with_limit_prefers_relevant_fragments() {
        let dir = corpus(&[
            ("1.txt", "Geometry basics: angles and triangles."),
            ("2.txt", "Division tips: division by ten shifts the decimal point."),
            ("3.txt", "Progression: track your trend over time to see improvement."),
        ]);
        let loader = ContextLoader::new(dir.path());
        assert_eq!(
            loader.select("How do I get better at division?", Some(1)),
            vec!["Division tips: division by ten shifts the decimal point."]
        );
        assert_eq!(
            loader.select("What is my progression trend?", Some(1)),
            vec!["Progression: track your trend over time to see improvement."]
        );
    }

    #[test]
    fn ties_keep_load_order() {
        let fragments = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        assert_eq!(rank(&fragments, "unrelated"), vec![0, 1, 2]);
    }
}
