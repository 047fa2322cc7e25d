use crate::{
    models::{self, Grade},
    srdb::{DBResult, Db, now_timestamp},
};

/////*============== RESULT QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::ResultRecord {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            subject: row.get("subject")?,
            score: row.get("score")?,
            grade: row.get("grade")?,
            level: row.get("level")?,
            semester: row.get("semester")?,
            session: row.get("session")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Finds the student's result for a subject (matched by course name).
pub fn query_result_by_subject(db: &Db, student_id: i64, subject: &str) -> DBResult<Option<models::ResultRecord>> {
    let connection = db.connect()?;
    connection
        .prepare(
            "SELECT * FROM Results
             WHERE student_id = :student_id AND subject = :subject
             ORDER BY id LIMIT 1",
        )?
        .query(rusqlite::named_params! { ":student_id": student_id, ":subject": subject })?
        .next()?
        .map(|row| row.try_into())
        .transpose()
}

/// Overwrites score and grade of an existing result in place.
pub fn update_result_score(db: &Db, result_id: i64, score: u8, grade: Grade) -> DBResult<()> {
    log::trace!("[update_result_score] Result {result_id} -> {score} ({grade})");
    let connection = db.connect()?;
    connection
        .prepare("UPDATE Results SET score = :score, grade = :grade WHERE id = :id")?
        .execute(rusqlite::named_params! { ":score": score, ":grade": grade, ":id": result_id })?;

    Ok(())
}

/// Inserts all rows in one transaction. Returns the number inserted.
pub fn insert_results(db: &Db, results: &[models::NewResult]) -> DBResult<usize> {
    if results.is_empty() {
        return Ok(0);
    }

    log::trace!("[insert_results] Inserting {} results...", results.len());
    let mut connection = db.connect()?;
    let transaction = connection.transaction()?;
    let created_at = now_timestamp();

    {
        let mut stmt = transaction.prepare(
            "INSERT INTO Results
                ( student_id,  subject,  score,  grade,  level,  semester,  session,  created_at)
             VALUES
                (:student_id, :subject, :score, :grade, :level, :semester, :session, :created_at)",
        )?;

        for result in results {
            stmt.execute(rusqlite::named_params! {
                ":student_id": result.student_id,
                ":subject":    result.subject,
                ":score":      result.score,
                ":grade":      result.grade,
                ":level":      result.level,
                ":semester":   result.semester,
                ":session":    result.session,
                ":created_at": created_at,
            })?;
        }
    }

    transaction.commit()
        .inspect_err(|err| log::error!("[insert_results] Could not commit results: {err}"))?;

    Ok(results.len())
}

/// All results for a student, newest first.
pub fn query_results_for_student(db: &Db, student_id: i64) -> DBResult<Vec<models::ResultRecord>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare(
        "SELECT * FROM Results
         WHERE student_id = :student_id
         ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map(rusqlite::named_params! { ":student_id": student_id },
                   |row| models::ResultRecord::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}

/// Just the scores for a student, oldest first.
pub fn query_scores_for_student(db: &Db, student_id: i64) -> DBResult<Vec<u8>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT score FROM Results WHERE student_id = :student_id ORDER BY id")?;
    let rows = stmt.query_map(rusqlite::named_params! { ":student_id": student_id }, |row| row.get("score"))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}

pub fn query_all_results(db: &Db) -> DBResult<Vec<models::ResultRecord>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT * FROM Results ORDER BY id")?;
    let rows = stmt.query_map([], |row| models::ResultRecord::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}
