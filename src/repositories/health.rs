use sqlx::PgPool;

pub(crate) async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Number of optional grading columns currently present on `homework_gradings`.
pub(crate) async fn grading_column_count(pool: &PgPool, columns: &[&str]) -> Result<i64, sqlx::Error> {
    let names: Vec<String> = columns.iter().map(|column| column.to_string()).collect();
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.columns \
         WHERE table_name = 'homework_gradings' AND column_name = ANY($1)",
    )
    .bind(names)
    .fetch_one(pool)
    .await
}
