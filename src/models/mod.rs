mod article;
mod cover;
mod preferences;

pub use article::{Article, ArticleFilter, NewArticle};
pub use cover::{CoverJob, CoverRequest, CoverStatus};
pub use preferences::{NewRating, PromptPreferences, RatingEvent, PREFERENCE_LIST_CAP};
