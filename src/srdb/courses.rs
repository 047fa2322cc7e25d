use crate::{
    models::{self, Level, Semester},
    srdb::{DBResult, Db, now_timestamp},
};

/////*============== COURSE QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Course {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            code: row.get("code")?,
            level: row.get("level")?,
            semester: row.get("semester")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::CourseAssignment {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            student_id: row.get("student_id")?,
            course_id: row.get("course_id")?,
            session: row.get("session")?,
        })
    }
}

/// Inserts a course into the catalogue. Returns its id.
pub fn insert_course(db: &Db, name: &str, code: &str, level: Level, semester: Semester) -> DBResult<i64> {
    let connection = db.connect()?;
    log::trace!("[insert_course] Inserting course {code} into Courses...");
    let created_at = now_timestamp();

    let query_params = rusqlite::named_params! {
            ":name":       name,
            ":code":       code,
            ":level":      level,
            ":semester":   semester,
            ":created_at": created_at,
    };

    connection
        .prepare(
            "INSERT INTO Courses ( name,  code,  level,  semester,  created_at)
             VALUES              (:name, :code, :level, :semester, :created_at)",
        )?
        .execute(query_params)?;

    Ok(connection.last_insert_rowid())
}

pub fn query_courses(db: &Db) -> DBResult<Vec<models::Course>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT * FROM Courses ORDER BY level, semester, code")?;
    let rows = stmt.query_map([], |row| models::Course::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}

pub fn query_course_by_code(db: &Db, code: &str) -> DBResult<Option<models::Course>> {
    let connection = db.connect()?;
    connection
        .prepare("SELECT * FROM Courses WHERE code = :code")?
        .query(rusqlite::named_params! { ":code": code })?
        .next()?
        .map(|row| row.try_into())
        .transpose()
}

/// Every course taught at exactly this level and semester.
pub fn query_courses_for_placement(db: &Db, level: Level, semester: Semester) -> DBResult<Vec<models::Course>> {
    log::trace!("[query_courses_for_placement] Querying courses for {level} {semester} semester.");
    let connection = db.connect()?;

    let mut stmt = connection.prepare(
        "SELECT * FROM Courses
         WHERE level = :level AND semester = :semester
         ORDER BY id",
    )?;

    let rows = stmt.query_map(rusqlite::named_params! { ":level": level, ":semester": semester },
                   |row| models::Course::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}

/// Assigns a course to a student for a session.
/// Returns `true` if it was newly added, false otherwise.
pub fn insert_assignment(db: &Db, student_id: i64, course_id: i64, session: &str) -> DBResult<bool> {
    let connection = db.connect()?;
    let created_at = now_timestamp();

    let query_params = rusqlite::named_params! {
            ":student_id": student_id,
            ":course_id":  course_id,
            ":session":    session,
            ":created_at": created_at,
    };

    connection
        .prepare(
            "INSERT INTO StudentCourses ( student_id,  course_id,  session,  created_at)
             VALUES                     (:student_id, :course_id, :session, :created_at)",
        )?
        .execute(query_params)
        .map_or_else(crate::srdb::swallow_constraint_violation, |_| Ok(true))
}

pub fn query_assignments(db: &Db, student_id: i64) -> DBResult<Vec<models::CourseAssignment>> {
    let connection = db.connect()?;
    let mut stmt = connection.prepare("SELECT * FROM StudentCourses WHERE student_id = :student_id ORDER BY id")?;
    let rows = stmt.query_map(rusqlite::named_params! { ":student_id": student_id },
                   |row| models::CourseAssignment::try_from(row))?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}

/// The student's assigned courses at their current placement, each paired with
/// the score already recorded for that course's subject, if any.
pub fn query_assigned_courses(db: &Db, student: &models::Student) -> DBResult<Vec<(models::Course, Option<u8>)>> {
    let connection = db.connect()?;

    let query_params = rusqlite::named_params! {
            ":student_id": student.id,
            ":level":      student.level,
            ":semester":   student.semester,
    };

    let mut stmt = connection.prepare(
        "SELECT c.*,
                (SELECT r.score FROM Results r
                 WHERE r.student_id = sc.student_id AND r.subject = c.name
                 ORDER BY r.id LIMIT 1) AS existing_score
         FROM StudentCourses sc
         JOIN Courses c ON c.id = sc.course_id
         WHERE sc.student_id = :student_id
           AND c.level = :level
           AND c.semester = :semester
         ORDER BY c.id",
    )?;

    let rows = stmt.query_map(query_params, |row| {
            Ok((models::Course::try_from(row)?, row.get("existing_score")?))
        })?
        .collect::<DBResult<Vec<_>>>()?;

    Ok(rows)
}
