//! Local vibe-history store (SQLite).

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use vibe_core::VibePoint;

/// One persisted vibe-score sample.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub recorded_at: DateTime<Utc>,
    pub mood: String,
    pub score: u8,
    pub note: Option<String>,
}

/// Per-day rollup of recorded scores.
#[derive(Debug, Clone)]
pub struct DayStats {
    /// `YYYY-MM-DD` in UTC.
    pub date: String,
    pub samples: usize,
    pub avg_score: f32,
}

pub struct VibeStore {
    conn: Connection,
}

impl VibeStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening vibe store at {}", path.display()))?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory vibe store")?;
        Self::init(&conn)?;
        Ok(Self { conn })
    }

    fn init(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS vibe_points (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at TEXT NOT NULL,
                mood        TEXT NOT NULL,
                score       INTEGER NOT NULL,
                note        TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_vibe_points_recorded_at
                ON vibe_points(recorded_at);",
        )
        .context("initializing vibe store schema")?;
        Ok(())
    }

    pub fn record_point(&self, point: &VibePoint, note: Option<&str>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vibe_points (recorded_at, mood, score, note) VALUES (?1, ?2, ?3, ?4)",
                params![
                    point.timestamp.to_rfc3339(),
                    point.mood.to_string(),
                    point.score as i64,
                    note
                ],
            )
            .context("recording vibe point")?;
        Ok(())
    }

    /// Most recent points, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT recorded_at, mood, score, note FROM vibe_points
             ORDER BY recorded_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let recorded_at: String = row.get(0)?;
            Ok((
                recorded_at,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (recorded_at, mood, score, note) = row?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .context("malformed timestamp in vibe store")?
                .with_timezone(&Utc);
            points.push(StoredPoint {
                recorded_at,
                mood,
                score: score.clamp(0, 100) as u8,
                note,
            });
        }
        Ok(points)
    }

    /// Daily average scores for the most recent `days` distinct days.
    pub fn daily_stats(&self, days: usize) -> Result<Vec<DayStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT substr(recorded_at, 1, 10) AS day,
                    COUNT(*),
                    AVG(score)
             FROM vibe_points
             GROUP BY day
             ORDER BY day DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![days as i64], |row| {
            Ok(DayStats {
                date: row.get(0)?,
                samples: row.get::<_, i64>(1)? as usize,
                avg_score: row.get::<_, f64>(2)? as f32,
            })
        })?;

        let mut stats = Vec::new();
        for row in rows {
            stats.push(row?);
        }
        Ok(stats)
    }
}
