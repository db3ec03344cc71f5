use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::extract;
use crate::models::{AttendanceRecord, AttendanceRow, MatchType, Student};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("B21DCVT020", "Nguyễn Văn An", "D21CQVT01-B"),
        ("B21DCCN101", "Trần Thị Bích", "D21CQCN02-B"),
        ("B21DCAT055", "Lê Văn Cường", "D21CQAT01-B"),
    ];

    for (code, name, class_name) in students {
        sqlx::query(
            r#"
            INSERT INTO attendance_tracker.students (student_code, full_name, class_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_code) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
            "#,
        )
        .bind(code)
        .bind(name)
        .bind(class_name)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn insert_student(
    pool: &PgPool,
    student_code: &str,
    name: &str,
    class_name: &str,
) -> Result<Student, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.students (student_code, full_name, class_name)
        VALUES ($1, $2, $3)
        RETURNING id, student_code, full_name, class_name
        "#,
    )
    .bind(student_code)
    .bind(name)
    .bind(class_name)
    .fetch_one(pool)
    .await?;

    Ok(student_from_row(&row))
}

pub async fn find_student_by_code(
    pool: &PgPool,
    student_code: &str,
) -> Result<Option<Student>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT id, student_code, full_name, class_name \
         FROM attendance_tracker.students WHERE student_code = $1",
    )
    .bind(student_code)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(student_from_row))
}

// Roster order is the matching tie-breaker, so it stays explicit.
pub async fn list_students(pool: &PgPool) -> Result<Vec<Student>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, student_code, full_name, class_name \
         FROM attendance_tracker.students ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(student_from_row).collect())
}

pub async fn insert_attendance(
    pool: &PgPool,
    student_id: i64,
    status: MatchType,
) -> Result<AttendanceRecord, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO attendance_tracker.attendance_records (student_id, status)
        VALUES ($1, $2)
        RETURNING id, student_id, recorded_at
        "#,
    )
    .bind(student_id)
    .bind(status.as_str())
    .fetch_one(pool)
    .await?;

    Ok(AttendanceRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        status,
        recorded_at: row.get("recorded_at"),
    })
}

pub async fn fetch_attendance(
    pool: &PgPool,
    since: DateTime<Utc>,
    class_name: Option<&str>,
    student_code: Option<&str>,
) -> Result<Vec<AttendanceRow>, sqlx::Error> {
    let mut query = String::from(
        "SELECT a.id, a.status, a.recorded_at, s.student_code, s.full_name, s.class_name \
         FROM attendance_tracker.attendance_records a \
         JOIN attendance_tracker.students s ON s.id = a.student_id \
         WHERE a.recorded_at >= $1",
    );

    if class_name.is_some() {
        query.push_str(" AND s.class_name = $2");
    } else if student_code.is_some() {
        query.push_str(" AND s.student_code = $2");
    }

    query.push_str(" ORDER BY a.recorded_at DESC");

    let mut rows = sqlx::query(&query).bind(since);

    if let Some(value) = class_name {
        rows = rows.bind(value);
    } else if let Some(value) = student_code {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut attendance = Vec::new();

    for row in records {
        attendance.push(AttendanceRow {
            id: row.get("id"),
            student_code: row.get("student_code"),
            student_name: row.get("full_name"),
            class_name: row.get("class_name"),
            status: row.get("status"),
            recorded_at: row.get("recorded_at"),
        });
    }

    Ok(attendance)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_code: String,
        full_name: String,
        class_name: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let code = row.student_code.trim().to_uppercase();

        if !extract::is_card_code(&code) {
            anyhow::bail!("invalid student code in CSV: {}", row.student_code);
        }

        sqlx::query(
            r#"
            INSERT INTO attendance_tracker.students (student_code, full_name, class_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (student_code) DO UPDATE
            SET full_name = EXCLUDED.full_name, class_name = EXCLUDED.class_name
            "#,
        )
        .bind(&code)
        .bind(row.full_name.trim())
        .bind(row.class_name.trim())
        .execute(pool)
        .await
        .with_context(|| format!("failed to import student {code}"))?;

        imported += 1;
    }

    Ok(imported)
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> Student {
    Student {
        id: row.get("id"),
        student_code: row.get("student_code"),
        name: row.get("full_name"),
        class_name: row.get("class_name"),
    }
}
