use std::sync::Arc;

use regex::Regex;
use tokio::sync::RwLock;

use crate::ai::Summarizer;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{NewRating, PromptPreferences, RatingEvent};

/// Ratings at or above this push extracted fragments into the liked lists.
const LIKED_THRESHOLD: u8 = 7;
/// Ratings at or below this push extracted fragments into the avoided list.
const DISLIKED_THRESHOLD: u8 = 4;

/// Phrase table mapping feedback substrings to prompt fragments. The bool is
/// whether the phrase expresses a complaint regardless of the numeric score
/// (e.g. "too small" in an otherwise positive rating still means the logo
/// should be bigger next time).
const SIZE_PATTERNS: &[(&str, &str)] = &[
    ("bigger", "large prominent logo"),
    ("too small", "large prominent logo"),
    ("too big", "subtle logo placement"),
    ("smaller", "subtle logo placement"),
];

const MATERIAL_PATTERNS: &[(&str, &str)] = &[
    ("glass", "glass material"),
    ("metallic", "metallic finish"),
    ("metal", "metallic finish"),
    ("chrome", "chrome surfaces"),
    ("neon", "neon glow"),
    ("holographic", "holographic sheen"),
    ("matte", "matte texture"),
];

const SCENE_PATTERNS: &[(&str, &str)] = &[
    ("space", "cosmic backdrop"),
    ("city", "futuristic cityscape"),
    ("ocean", "fluid ocean tones"),
    ("circuit", "circuit board detail"),
    ("abstract", "abstract geometry"),
    ("gradient", "smooth gradients"),
];

const COMPLAINT_PATTERNS: &[(&str, &str)] = &[
    ("cluttered", "clean composition"),
    ("busy", "clean composition"),
    ("blurry", "sharp focus"),
    ("dark", "brighter lighting"),
    ("washed out", "vivid colors"),
    ("boring", "dynamic composition"),
];

/// Fragments extracted from one piece of free-text feedback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedKeywords {
    pub liked: Vec<String>,
    pub disliked: Vec<String>,
    pub materials: Vec<String>,
    pub scenes: Vec<String>,
}

/// Regex keyword extraction over free-text feedback. Sentences containing a
/// negation ("no", "not", "without", "less") flip the fragment to disliked.
pub fn extract_keywords(feedback: &str) -> ExtractedKeywords {
    let mut out = ExtractedKeywords::default();
    let negation = Regex::new(r"\b(no|not|without|less|avoid|hate|don't)\b").unwrap();

    for sentence in feedback.split(['.', ';', ',', '\n']) {
        let lower = sentence.to_lowercase();
        let negated = negation.is_match(&lower);

        for (needle, fragment) in SIZE_PATTERNS {
            if lower.contains(needle) {
                out.liked.push(fragment.to_string());
            }
        }
        for (needle, fragment) in MATERIAL_PATTERNS {
            if lower.contains(needle) {
                if negated {
                    out.disliked.push(fragment.to_string());
                } else {
                    out.materials.push(fragment.to_string());
                }
            }
        }
        for (needle, fragment) in SCENE_PATTERNS {
            if lower.contains(needle) {
                if negated {
                    out.disliked.push(fragment.to_string());
                } else {
                    out.scenes.push(fragment.to_string());
                }
            }
        }
        for (needle, fragment) in COMPLAINT_PATTERNS {
            if lower.contains(needle) {
                out.liked.push(fragment.to_string());
            }
        }
    }

    out.liked.dedup();
    out.disliked.dedup();
    out.materials.dedup();
    out.scenes.dedup();
    out
}

/// Fold the full rating log, oldest first, into derived preferences.
/// Deterministic: reruns over the same log always agree.
pub fn fold_events(events: &[RatingEvent]) -> PromptPreferences {
    let mut prefs = PromptPreferences::default();
    let mut score_sum: u64 = 0;

    for event in events {
        score_sum += event.overall as u64;
        prefs.ratings_seen += 1;

        let extracted = event
            .feedback
            .as_deref()
            .map(extract_keywords)
            .unwrap_or_default();

        if event.overall >= LIKED_THRESHOLD {
            for kw in extracted.liked {
                PromptPreferences::push_capped(&mut prefs.good_keywords, kw);
            }
            for m in extracted.materials {
                PromptPreferences::push_capped(&mut prefs.preferred_materials, m);
            }
            for s in extracted.scenes {
                PromptPreferences::push_capped(&mut prefs.preferred_scenes, s);
            }
        } else if event.overall <= DISLIKED_THRESHOLD {
            // A low score turns everything mentioned into avoidance signals,
            // except explicit corrections which stay actionable.
            for kw in extracted.liked {
                PromptPreferences::push_capped(&mut prefs.good_keywords, kw);
            }
            for m in extracted.materials {
                PromptPreferences::push_capped(&mut prefs.bad_keywords, m);
            }
            for s in extracted.scenes {
                PromptPreferences::push_capped(&mut prefs.bad_keywords, s);
            }
        }
        for kw in extracted.disliked {
            PromptPreferences::push_capped(&mut prefs.bad_keywords, kw);
        }
    }

    if prefs.ratings_seen > 0 {
        prefs.average_overall = score_sum as f64 / prefs.ratings_seen as f64;
    }
    prefs
}

/// Accumulates cover ratings and derives prompt preferences from them.
pub struct PreferenceService {
    repository: Arc<Repository>,
    summarizer: Option<Arc<Summarizer>>,
    cached: RwLock<PromptPreferences>,
}

impl PreferenceService {
    pub async fn new(
        repository: Arc<Repository>,
        summarizer: Option<Arc<Summarizer>>,
    ) -> Result<Self> {
        let events = repository.get_rating_events().await?;
        let cached = RwLock::new(fold_events(&events));
        Ok(Self {
            repository,
            summarizer,
            cached,
        })
    }

    pub async fn current(&self) -> PromptPreferences {
        self.cached.read().await.clone()
    }

    /// Append a rating event and refresh the derived preferences. The event
    /// log is authoritative; the fold is recomputed rather than patched so
    /// concurrent raters cannot lose each other's updates.
    pub async fn record_rating(&self, rating: NewRating) -> Result<PromptPreferences> {
        if !(1..=10).contains(&rating.overall) {
            return Err(crate::error::AppError::InvalidRequest(
                "overall rating must be between 1 and 10".to_string(),
            ));
        }

        let feedback = rating.feedback.clone();
        let overall = rating.overall;
        self.repository.insert_rating(rating).await?;

        let events = self.repository.get_rating_events().await?;
        let mut prefs = fold_events(&events);

        // LLM enrichment is best-effort and process-local; the regex fold
        // over the event log remains the source of truth.
        if let (Some(summarizer), Some(text)) = (&self.summarizer, feedback.as_deref()) {
            match summarizer.analyze_feedback(text).await {
                Ok(analysis) => {
                    if overall >= LIKED_THRESHOLD {
                        for kw in analysis.liked {
                            PromptPreferences::push_capped(&mut prefs.good_keywords, kw);
                        }
                    }
                    for kw in analysis.disliked {
                        PromptPreferences::push_capped(&mut prefs.bad_keywords, kw);
                    }
                }
                Err(e) => tracing::debug!("feedback analysis unavailable: {}", e),
            }
        }

        *self.cached.write().await = prefs.clone();
        Ok(prefs)
    }
}
