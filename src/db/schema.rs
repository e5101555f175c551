pub const SCHEMA: &str = r#"
-- Events: a named gathering held once per year
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    year INTEGER NOT NULL,
    UNIQUE (name, year)
);

-- Days: one calendar date of an event
CREATE TABLE IF NOT EXISTS days (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL,
    name TEXT NOT NULL,        -- short label, e.g. 'tuesday'
    date TEXT NOT NULL,        -- YYYY-MM-DD
    updated_at TEXT NOT NULL,
    UNIQUE (event_id, name),
    FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
);

-- Sessions: one continuous burst of photos
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    day_id INTEGER NOT NULL,
    burst_id TEXT NOT NULL UNIQUE,
    number INTEGER NOT NULL,
    started_at TEXT,
    ended_at TEXT,
    photo_count INTEGER NOT NULL DEFAULT 0,
    hero_photo_id INTEGER,
    hidden INTEGER NOT NULL DEFAULT 0,
    source TEXT,               -- capture device tag
    tags_people TEXT NOT NULL DEFAULT '[]',
    tags_activity TEXT NOT NULL DEFAULT '[]',
    tags_location TEXT NOT NULL DEFAULT '[]',
    tags_misc TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL,
    FOREIGN KEY (day_id) REFERENCES days(id) ON DELETE CASCADE,
    FOREIGN KEY (hero_photo_id) REFERENCES photos(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_day ON sessions(day_id);
CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at);

-- Photos: position is dense and follows capture order within a session
CREATE TABLE IF NOT EXISTS photos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    position INTEGER NOT NULL,
    rejected INTEGER NOT NULL DEFAULT 0,
    faces TEXT,                -- JSON array of bounding boxes
    exif TEXT,                 -- embedded metadata as JSON
    taken_at TEXT,             -- DateTimeOriginal, event-local wall clock
    source_path TEXT,          -- original file, for late metadata extraction
    portrait_crop TEXT,        -- JSON rectangle
    updated_at TEXT NOT NULL,
    UNIQUE (session_id, position),
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_photos_session ON photos(session_id);
CREATE INDEX IF NOT EXISTS idx_photos_updated ON photos(updated_at);

-- Sittings: legacy contact capture, not a reliable session/person link
CREATE TABLE IF NOT EXISTS sittings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER,
    name TEXT,
    email TEXT,
    hero_photo_id INTEGER,     -- deprecated
    created_at TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE SET NULL,
    FOREIGN KEY (hero_photo_id) REFERENCES photos(id) ON DELETE SET NULL
);

CREATE INDEX IF NOT EXISTS idx_sittings_session ON sittings(session_id);
"#;

/// Additive changes for databases created by earlier versions.
/// Each statement may fail harmlessly when already applied.
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE photos ADD COLUMN portrait_crop TEXT",
    "ALTER TABLE photos ADD COLUMN source_path TEXT",
];
