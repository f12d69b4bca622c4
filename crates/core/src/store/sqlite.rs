//! SQLite-backed store shared between the runner and answering clients.

use super::{Store, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;
use vf_protocol::assessment_models::{
    Action, ActionDecision, Alert, RiskAssessment, RiskLevel, Urgency,
};
use vf_protocol::interaction_models::{Interaction, InteractionStatus};
use vf_protocol::run_models::{RunRecord, RunStatus};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS interactions (
        id TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        question TEXT NOT NULL,
        answer TEXT,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        answered_at TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_interactions_subject ON interactions(subject_id, created_at)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_interactions_one_pending ON interactions(subject_id) WHERE status = 'PENDING'",
    r#"
    CREATE TABLE IF NOT EXISTS risk_assessments (
        id TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        risk_level TEXT NOT NULL,
        risk_score INTEGER NOT NULL,
        justification TEXT NOT NULL,
        requires_immediate_action INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_assessments_subject ON risk_assessments(subject_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS action_decisions (
        id TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        action TEXT NOT NULL,
        urgency TEXT NOT NULL,
        note TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_decisions_subject ON action_decisions(subject_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        alert_type TEXT NOT NULL,
        message TEXT NOT NULL,
        call_received INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_alerts_subject ON alerts(subject_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS runs (
        id TEXT PRIMARY KEY NOT NULL,
        subject_id TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        error TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_runs_subject ON runs(subject_id, started_at)",
];

/// Store over a SQLite connection pool.
///
/// Each call acquires its own pooled connection, so a polling loop and an
/// answering process never contend for a long-lived handle.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a `sqlite:` URL, creating the file and schema if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        if let Some(parent) = database_path(url).and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(url)?;
        Self::with_options(options).await
    }

    /// Open a database file, creating the file and schema if needed.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Self::with_options(SqliteConnectOptions::new().filename(path)).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// File path of a `sqlite:` URL, or `None` for in-memory databases.
fn database_path(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next()?;

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            column,
            value: value.to_string(),
        })
}

fn parse_id(column: &'static str, value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|_| StoreError::Corrupt {
        column,
        value: value.to_string(),
    })
}

#[derive(FromRow)]
struct InteractionRow {
    id: String,
    subject_id: String,
    question: String,
    answer: Option<String>,
    status: String,
    created_at: String,
    answered_at: Option<String>,
}

impl InteractionRow {
    fn into_interaction(self) -> Result<Interaction, StoreError> {
        let status = InteractionStatus::parse(&self.status).ok_or(StoreError::Corrupt {
            column: "status",
            value: self.status.clone(),
        })?;

        Ok(Interaction {
            id: parse_id("id", &self.id)?,
            subject_id: self.subject_id,
            question: self.question,
            answer: self.answer,
            status,
            created_at: parse_timestamp("created_at", &self.created_at)?,
            answered_at: self
                .answered_at
                .as_deref()
                .map(|value| parse_timestamp("answered_at", value))
                .transpose()?,
        })
    }
}

#[derive(FromRow)]
struct AssessmentRow {
    id: String,
    subject_id: String,
    risk_level: String,
    risk_score: i64,
    justification: String,
    requires_immediate_action: bool,
    created_at: String,
}

impl AssessmentRow {
    fn into_assessment(self) -> Result<RiskAssessment, StoreError> {
        let justification = serde_json::from_str(&self.justification)
            .unwrap_or(serde_json::Value::String(self.justification));

        Ok(RiskAssessment {
            id: parse_id("id", &self.id)?,
            subject_id: self.subject_id,
            risk_level: RiskLevel::parse(&self.risk_level),
            risk_score: self.risk_score.clamp(0, 100) as u8,
            justification,
            requires_immediate_action: self.requires_immediate_action,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct DecisionRow {
    id: String,
    subject_id: String,
    action: String,
    urgency: String,
    note: String,
    created_at: String,
}

impl DecisionRow {
    fn into_decision(self) -> Result<ActionDecision, StoreError> {
        Ok(ActionDecision {
            id: parse_id("id", &self.id)?,
            subject_id: self.subject_id,
            action: Action::parse(&self.action),
            urgency: Urgency::parse(&self.urgency),
            note: self.note,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct AlertRow {
    id: String,
    subject_id: String,
    alert_type: String,
    message: String,
    call_received: bool,
    created_at: String,
}

impl AlertRow {
    fn into_alert(self) -> Result<Alert, StoreError> {
        Ok(Alert {
            id: parse_id("id", &self.id)?,
            subject_id: self.subject_id,
            alert_type: Action::parse(&self.alert_type),
            message: self.message,
            call_received: self.call_received,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct RunRow {
    id: String,
    subject_id: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    error: Option<String>,
}

impl RunRow {
    fn into_record(self) -> Result<RunRecord, StoreError> {
        let status = RunStatus::parse(&self.status).ok_or(StoreError::Corrupt {
            column: "status",
            value: self.status.clone(),
        })?;

        Ok(RunRecord {
            id: parse_id("id", &self.id)?,
            subject_id: self.subject_id,
            status,
            started_at: parse_timestamp("started_at", &self.started_at)?,
            finished_at: self
                .finished_at
                .as_deref()
                .map(|value| parse_timestamp("finished_at", value))
                .transpose()?,
            error: self.error,
        })
    }
}

const INTERACTION_COLUMNS: &str =
    "id, subject_id, question, answer, status, created_at, answered_at";

#[async_trait]
impl Store for SqliteStore {
    async fn insert_interaction(&self, interaction: &Interaction) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO interactions (id, subject_id, question, answer, status, created_at, answered_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(interaction.id.to_string())
        .bind(&interaction.subject_id)
        .bind(&interaction.question)
        .bind(&interaction.answer)
        .bind(interaction.status.as_str())
        .bind(timestamp(&interaction.created_at))
        .bind(interaction.answered_at.as_ref().map(timestamp))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() && interaction.is_pending() => {
                Err(StoreError::PendingExists(interaction.subject_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_interaction(&self, id: Uuid) -> Result<Option<Interaction>, StoreError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {} FROM interactions WHERE id = ?",
            INTERACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InteractionRow::into_interaction).transpose()
    }

    async fn answer_interaction(&self, id: Uuid, answer: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE interactions SET status = ?, answer = ?, answered_at = ? WHERE id = ? AND status = ?",
        )
        .bind(InteractionStatus::Answered.as_str())
        .bind(answer)
        .bind(timestamp(&Utc::now()))
        .bind(id.to_string())
        .bind(InteractionStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_timed_out(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE interactions SET status = ?, answered_at = ? WHERE id = ? AND status = ?",
        )
        .bind(InteractionStatus::TimedOut.as_str())
        .bind(timestamp(&Utc::now()))
        .bind(id.to_string())
        .bind(InteractionStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_pending(&self, subject_id: &str, note: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE interactions SET status = ?, answer = ?, answered_at = ? WHERE subject_id = ? AND status = ?",
        )
        .bind(InteractionStatus::Cancelled.as_str())
        .bind(note)
        .bind(timestamp(&Utc::now()))
        .bind(subject_id)
        .bind(InteractionStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn pending_interaction(
        &self,
        subject_id: &str,
    ) -> Result<Option<Interaction>, StoreError> {
        let row = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {} FROM interactions WHERE subject_id = ? AND status = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
            INTERACTION_COLUMNS
        ))
        .bind(subject_id)
        .bind(InteractionStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(InteractionRow::into_interaction).transpose()
    }

    async fn list_interactions(&self, subject_id: &str) -> Result<Vec<Interaction>, StoreError> {
        let rows = sqlx::query_as::<_, InteractionRow>(&format!(
            "SELECT {} FROM interactions WHERE subject_id = ? ORDER BY created_at ASC, rowid ASC",
            INTERACTION_COLUMNS
        ))
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InteractionRow::into_interaction).collect()
    }

    async fn save_outcome(
        &self,
        assessment: &RiskAssessment,
        decision: &ActionDecision,
        alert: Option<&Alert>,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO risk_assessments (id, subject_id, risk_level, risk_score, justification, requires_immediate_action, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(assessment.id.to_string())
        .bind(&assessment.subject_id)
        .bind(assessment.risk_level.as_str())
        .bind(i64::from(assessment.risk_score))
        .bind(assessment.justification.to_string())
        .bind(assessment.requires_immediate_action)
        .bind(timestamp(&assessment.created_at))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO action_decisions (id, subject_id, action, urgency, note, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(decision.id.to_string())
        .bind(&decision.subject_id)
        .bind(decision.action.as_str())
        .bind(decision.urgency.as_str())
        .bind(&decision.note)
        .bind(timestamp(&decision.created_at))
        .execute(&mut *tx)
        .await?;

        if let Some(alert) = alert {
            sqlx::query(
                r#"
                INSERT INTO alerts (id, subject_id, alert_type, message, call_received, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(alert.id.to_string())
            .bind(&alert.subject_id)
            .bind(alert.alert_type.as_str())
            .bind(&alert.message)
            .bind(alert.call_received)
            .bind(timestamp(&alert.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest_assessment(
        &self,
        subject_id: &str,
    ) -> Result<Option<RiskAssessment>, StoreError> {
        let row = sqlx::query_as::<_, AssessmentRow>(
            "SELECT id, subject_id, risk_level, risk_score, justification, requires_immediate_action, created_at FROM risk_assessments WHERE subject_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AssessmentRow::into_assessment).transpose()
    }

    async fn latest_decision(&self, subject_id: &str) -> Result<Option<ActionDecision>, StoreError> {
        let row = sqlx::query_as::<_, DecisionRow>(
            "SELECT id, subject_id, action, urgency, note, created_at FROM action_decisions WHERE subject_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DecisionRow::into_decision).transpose()
    }

    async fn list_alerts(&self, subject_id: &str) -> Result<Vec<Alert>, StoreError> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT id, subject_id, alert_type, message, call_received, created_at FROM alerts WHERE subject_id = ? ORDER BY created_at ASC, rowid ASC",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AlertRow::into_alert).collect()
    }

    async fn save_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, subject_id, status, started_at, finished_at, error)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                finished_at = excluded.finished_at,
                error = excluded.error
            "#,
        )
        .bind(run.id.to_string())
        .bind(&run.subject_id)
        .bind(run.status.as_str())
        .bind(timestamp(&run.started_at))
        .bind(run.finished_at.as_ref().map(timestamp))
        .bind(&run.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_run(&self, subject_id: &str) -> Result<Option<RunRecord>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            "SELECT id, subject_id, status, started_at, finished_at, error FROM runs WHERE subject_id = ? ORDER BY started_at DESC, rowid DESC LIMIT 1",
        )
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RunRow::into_record).transpose()
    }
}
