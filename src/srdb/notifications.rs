use crate::{
    models::{self, NotificationStatus},
    srdb::{DBResult, Db, now_timestamp},
};

/////*============== NOTIFICATION LOG QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::NotificationLog {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            phone: row.get("phone")?,
            message: row.get("message")?,
            status: row.get("status")?,
            error_message: row.get("error_message")?,
            sent_at: row.get("sent_at")?,
        })
    }
}

/// Which log rows to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFilter {
    #[default]
    All,
    Status(NotificationStatus),
}

/// Appends one log row. Rows are never updated afterwards.
pub fn insert_log(
    db: &Db,
    student_id: i64,
    phone: &str,
    message: &str,
    status: NotificationStatus,
    error_message: Option<&str>,
) -> DBResult<i64> {
    let connection = db.connect()?;
    let sent_at = now_timestamp();

    log::trace!("[insert_log] Logging {status} notification for student {student_id}");

    let query_params = rusqlite::named_params! {
            ":student_id":    student_id,
            ":phone":         phone,
            ":message":       message,
            ":status":        status,
            ":error_message": error_message,
            ":sent_at":       sent_at,
    };

    connection
        .prepare(
            "INSERT INTO SmsLogs ( student_id,  phone,  message,  status,  error_message,  sent_at)
             VALUES              (:student_id, :phone, :message, :status, :error_message, :sent_at)",
        )?
        .execute(query_params)
        .inspect_err(|err| log::error!("[insert_log] Could not log notification: {err}"))?;

    Ok(connection.last_insert_rowid())
}

/// Log rows, newest first.
pub fn query_logs(db: &Db, filter: LogFilter) -> DBResult<Vec<models::NotificationLog>> {
    let connection = db.connect()?;

    let logs = match filter {
        LogFilter::All => {
            let mut stmt = connection.prepare("SELECT * FROM SmsLogs ORDER BY id DESC")?;
            let rows = stmt.query_map([], |row| models::NotificationLog::try_from(row))?
                .collect::<DBResult<Vec<_>>>()?;
            rows
        }
        LogFilter::Status(status) => {
            let mut stmt = connection.prepare("SELECT * FROM SmsLogs WHERE status = :status ORDER BY id DESC")?;
            let rows = stmt.query_map(rusqlite::named_params! { ":status": status },
                                      |row| models::NotificationLog::try_from(row))?
                .collect::<DBResult<Vec<_>>>()?;
            rows
        }
    };

    Ok(logs)
}

pub fn query_logs_for_student(db: &Db, student_id: i64) -> DBResult<Vec<models::NotificationLog>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT * FROM SmsLogs WHERE student_id = :student_id ORDER BY id DESC")?;
    let logs = stmt
        .query_map(rusqlite::named_params! { ":student_id": student_id },
                   |row| models::NotificationLog::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(logs)
}

/// Distinct students whose most recent log row is a failure, by student id.
///
/// "Most recent" is insertion order, so two rows written within the same
/// timestamp still have a well-defined latest.
pub fn query_students_with_failed_latest(db: &Db) -> DBResult<Vec<i64>> {
    log::trace!("[query_students_with_failed_latest] Looking for failed notifications.");
    let connection = db.connect()?;

    let mut stmt = connection.prepare(
        "SELECT l.student_id
         FROM SmsLogs l
         WHERE l.id = (SELECT MAX(latest.id) FROM SmsLogs latest WHERE latest.student_id = l.student_id)
           AND l.status = :failed
         ORDER BY l.student_id",
    )?;

    let ids = stmt
        .query_map(rusqlite::named_params! { ":failed": NotificationStatus::Failed }, |row| row.get(0))?
        .collect::<DBResult<Vec<i64>>>()?;

    Ok(ids)
}

pub fn count_by_status(db: &Db, status: NotificationStatus) -> DBResult<usize> {
    let connection = db.connect()?;
    connection
        .prepare("SELECT COUNT(*) FROM SmsLogs WHERE status = :status")?
        .query_row(rusqlite::named_params! { ":status": status }, |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use crate::models::{Level, NewStudent, Semester};
    use crate::srdb::{testing::temp_db, users};

    fn student(db: &Db, email: &str) -> i64 {
        let new = NewStudent {
            name: "Ada".to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
            phone: Some("2348000000000".to_string()),
            level: Level::ND2,
            semester: Semester::Second,
        };
        users::insert_student(db, &new, &Credential::new("pw")).unwrap()
    }

    #[test]
    fn latest_status_decides_resend_set() {
        let (_dir, db) = temp_db();
        let a = student(&db, "a@school.edu");
        let b = student(&db, "b@school.edu");
        let c = student(&db, "c@school.edu");

        // a: failed then succeeded; b: failed twice; c: succeeded then failed
        insert_log(&db, a, "+1", "m", NotificationStatus::Failed, Some("timeout")).unwrap();
        insert_log(&db, b, "+2", "m", NotificationStatus::Failed, Some("timeout")).unwrap();
        insert_log(&db, a, "+1", "m", NotificationStatus::Success, None).unwrap();
        insert_log(&db, b, "+2", "m", NotificationStatus::Failed, Some("bad number")).unwrap();
        insert_log(&db, c, "+3", "m", NotificationStatus::Success, None).unwrap();
        insert_log(&db, c, "+3", "m", NotificationStatus::Failed, Some("rejected")).unwrap();

        assert_eq!(query_students_with_failed_latest(&db).unwrap(), vec![b, c]);
    }

    #[test]
    fn filters_and_counts() {
        let (_dir, db) = temp_db();
        let a = student(&db, "a@school.edu");
        insert_log(&db, a, "+1", "first", NotificationStatus::Success, None).unwrap();
        insert_log(&db, a, "+1", "second", NotificationStatus::Failed, Some("nope")).unwrap();

        let all = query_logs(&db, LogFilter::All).unwrap();
        assert_eq!(all.iter().map(|l| l.message.as_str()).collect::<Vec<_>>(), vec!["second", "first"]);
        assert_eq!(all[0].error_message.as_deref(), Some("nope"));

        let failed = query_logs(&db, LogFilter::Status(NotificationStatus::Failed)).unwrap();
        assert_eq!(failed.len(), 1);

        assert_eq!(count_by_status(&db, NotificationStatus::Success).unwrap(), 1);
        assert_eq!(count_by_status(&db, NotificationStatus::Pending).unwrap(), 0);
        assert_eq!(query_logs_for_student(&db, a).unwrap().len(), 2);
    }
}
