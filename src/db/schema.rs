use sqlx::PgPool;

/// Postgres SQLSTATE for `ADD COLUMN` on a column that already exists.
const DUPLICATE_COLUMN: &str = "42701";

/// Grading columns introduced after the base table shipped, in the order they were
/// added. New columns are appended here and never removed.
pub(crate) const GRADING_OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("total_questions", "INTEGER"),
    ("correct_answers", "INTEGER"),
    ("problem_analysis", "JSONB"),
    ("weakness_types", "JSONB"),
    ("detailed_analysis", "TEXT"),
    ("study_direction", "TEXT"),
    ("grade", "INTEGER"),
    ("grading_outcome", "gradingoutcome"),
];

/// Adds every optional grading column. Runs once at startup, before the first insert.
/// A column that already exists is skipped; any other schema error is returned.
pub(crate) async fn ensure_grading_columns(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut added = 0usize;

    for (column, sql_type) in GRADING_OPTIONAL_COLUMNS {
        let statement = format!("ALTER TABLE homework_gradings ADD COLUMN {column} {sql_type}");
        match sqlx::query(&statement).execute(pool).await {
            Ok(_) => {
                added += 1;
                tracing::info!(column, "Added grading column");
            }
            Err(err) if is_duplicate_column(&err) => {
                tracing::debug!(column, "Grading column already present");
            }
            Err(err) => return Err(err),
        }
    }

    tracing::info!(added, total = GRADING_OPTIONAL_COLUMNS.len(), "Grading schema ensured");
    Ok(())
}

fn is_duplicate_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => is_duplicate_column_code(db_err.code().as_deref()),
        _ => false,
    }
}

fn is_duplicate_column_code(code: Option<&str>) -> bool {
    code == Some(DUPLICATE_COLUMN)
}
