pub const SCHEMA: &str = r#"
-- articles table
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    content TEXT,
    summary TEXT,
    url TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    published_at TEXT,
    category TEXT,
    network TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    sentiment TEXT,
    impact TEXT,
    is_breaking INTEGER NOT NULL DEFAULT 0,
    cover_image TEXT,
    metadata TEXT,
    fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_articles_url ON articles(url);
CREATE INDEX IF NOT EXISTS idx_articles_published_at ON articles(published_at DESC);
CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
CREATE INDEX IF NOT EXISTS idx_articles_network ON articles(network);

-- bookmarks table
CREATE TABLE IF NOT EXISTS bookmarks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(user_id, article_id)
);

CREATE INDEX IF NOT EXISTS idx_bookmarks_user_id ON bookmarks(user_id);

-- rating_events table (append-only; preferences are derived by folding this log)
CREATE TABLE IF NOT EXISTS rating_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT,
    network TEXT NOT NULL,
    style TEXT,
    overall INTEGER NOT NULL,
    logo_integration INTEGER,
    background_quality INTEGER,
    feedback TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_rating_events_network ON rating_events(network);
"#;
