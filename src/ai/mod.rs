mod summarizer;

pub use summarizer::{FeedbackAnalysis, Summarizer};
