use crate::{
    auth::Credential,
    models::{self, Role},
    srdb::{DBResult, Db, now_timestamp},
};

/////*============== USER QUERIES ==============*/
impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Account {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            role: row.get("role")?,
        })
    }
}

impl<'a> TryFrom<&'a rusqlite::Row<'a>> for models::Student {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            level: row.get("level")?,
            semester: row.get("semester")?,
            cgpa: row.get("cgpa")?,
        })
    }
}

/// Inserts an admin account. Returns its id.
pub fn insert_admin(db: &Db, name: &str, email: &str, credential: &Credential) -> DBResult<i64> {
    let connection = db.connect()?;
    log::trace!("[insert_admin] Inserting admin {email} into Users...");
    let created_at = now_timestamp();

    let query_params = rusqlite::named_params! {
            ":name":          name,
            ":email":         email,
            ":password_salt": credential.salt,
            ":password_hash": credential.hash,
            ":role":          Role::Admin,
            ":created_at":    created_at,
    };

    connection.prepare(
        "INSERT INTO Users ( name,  email,  password_salt,  password_hash,  role,  created_at)
         VALUES            (:name, :email, :password_salt, :password_hash, :role, :created_at)"
    )?.execute(query_params)?;

    Ok(connection.last_insert_rowid())
}

/// Inserts a student with a CGPA of zero. Returns its id.
///
/// `student.password` is ignored; only `credential` is stored.
pub fn insert_student(db: &Db, student: &models::NewStudent, credential: &Credential) -> DBResult<i64> {
    let connection = db.connect()?;
    log::trace!("[insert_student] Inserting student {} into Users...", student.email);
    let created_at = now_timestamp();

    let query_params = rusqlite::named_params! {
            ":name":          student.name,
            ":email":         student.email,
            ":password_salt": credential.salt,
            ":password_hash": credential.hash,
            ":phone":         student.phone,
            ":role":          Role::Student,
            ":level":         student.level,
            ":semester":      student.semester,
            ":created_at":    created_at,
    };

    connection.prepare(
        "INSERT INTO Users ( name,  email,  password_salt,  password_hash,  phone,  role,
                             level,  semester,  cgpa,  created_at)
         VALUES            (:name, :email, :password_salt, :password_hash, :phone, :role,
                            :level, :semester, 0.0, :created_at)"
    )?.execute(query_params)?;

    let id = connection.last_insert_rowid();
    log::info!("Student {} has been added to the database.", student.email);
    Ok(id)
}

/// Returns the account and stored credential for `email`, if any.
pub fn query_account_with_credential(db: &Db, email: &str) -> DBResult<Option<(models::Account, Credential)>> {
    let connection = db.connect()?;

    connection
        .prepare("SELECT * FROM Users WHERE email = :email")?
        .query(rusqlite::named_params! { ":email": email })?
        .next()?
        .map(|row| -> DBResult<(models::Account, Credential)> {
            let account = models::Account::try_from(row)?;
            let credential = Credential {
                salt: row.get("password_salt")?,
                hash: row.get("password_hash")?,
            };
            Ok((account, credential))
        })
        .transpose()
}

pub fn email_exists(db: &Db, email: &str) -> DBResult<bool> {
    let connection = db.connect()?;
    connection
        .prepare("SELECT 1 FROM Users WHERE email = :email")?
        .exists(rusqlite::named_params! { ":email": email })
}

/// Returns the student with id `id`, if they exist.
pub fn query_student(db: &Db, id: i64) -> DBResult<Option<models::Student>> {
    let connection = db.connect()?;

    connection
        .prepare("SELECT * FROM Users WHERE id = :id AND role = 'student'")?
        .query(rusqlite::named_params! { ":id": id })?
        .next()?
        .map(|row| row.try_into())
        .transpose()
}

pub fn query_student_by_email(db: &Db, email: &str) -> DBResult<Option<models::Student>> {
    let connection = db.connect()?;

    connection
        .prepare("SELECT * FROM Users WHERE email = :email AND role = 'student'")?
        .query(rusqlite::named_params! { ":email": email })?
        .next()?
        .map(|row| row.try_into())
        .transpose()
}

/// The full roster, in creation order.
pub fn query_students(db: &Db) -> DBResult<Vec<models::Student>> {
    log::trace!("[query_students] Querying all students.");
    let connection = db.connect()?;

    let mut stmt = connection.prepare("SELECT * FROM Users WHERE role = 'student' ORDER BY id")?;
    let students = stmt
        .query_map([], |row| models::Student::try_from(row))?
        .collect::<DBResult<Vec<models::Student>>>()?;

    Ok(students)
}

/// The roster restricted to `ids`, still in roster order. Unknown ids are ignored.
pub fn query_students_by_ids(db: &Db, ids: &[i64]) -> DBResult<Vec<models::Student>> {
    Ok(query_students(db)?
        .into_iter()
        .filter(|student| ids.contains(&student.id))
        .collect())
}

/// Overwrites the cached CGPA for a student.
pub fn update_cgpa(db: &Db, student_id: i64, cgpa: f64) -> DBResult<()> {
    let connection = db.connect()?;
    connection
        .prepare("UPDATE Users SET cgpa = :cgpa WHERE id = :id")?
        .execute(rusqlite::named_params! { ":cgpa": cgpa, ":id": student_id })
        .inspect_err(|err| log::error!("[update_cgpa] Could not update CGPA for {student_id}: {err}"))?;

    log::trace!("[update_cgpa] Student {student_id} CGPA is now {cgpa:.2}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Level, NewStudent, Semester};
    use crate::srdb::testing::temp_db;

    fn new_student(email: &str) -> NewStudent {
        NewStudent {
            name: "Ada Obi".to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
            phone: Some("2348012345678".to_string()),
            level: Level::ND1,
            semester: Semester::First,
        }
    }

    #[test]
    fn students_are_listed_in_creation_order() {
        let (_dir, db) = temp_db();
        insert_admin(&db, "Admin", "admin@school.edu", &Credential::new("x")).unwrap();
        let a = insert_student(&db, &new_student("a@school.edu"), &Credential::new("pw")).unwrap();
        let b = insert_student(&db, &new_student("b@school.edu"), &Credential::new("pw")).unwrap();

        let roster = query_students(&db).unwrap();
        assert_eq!(roster.iter().map(|s| s.id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(roster[0].cgpa, 0.0);
        assert_eq!(roster[0].level, Level::ND1);

        let subset = query_students_by_ids(&db, &[b, 999]).unwrap();
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].email, "b@school.edu");
    }

    #[test]
    fn admins_are_not_students() {
        let (_dir, db) = temp_db();
        let admin = insert_admin(&db, "Admin", "admin@school.edu", &Credential::new("x")).unwrap();
        assert!(query_student(&db, admin).unwrap().is_none());
        assert!(query_student_by_email(&db, "admin@school.edu").unwrap().is_none());
        assert!(email_exists(&db, "admin@school.edu").unwrap());
    }

    #[test]
    fn duplicate_email_is_rejected_by_the_table() {
        let (_dir, db) = temp_db();
        insert_student(&db, &new_student("a@school.edu"), &Credential::new("pw")).unwrap();
        assert!(insert_student(&db, &new_student("a@school.edu"), &Credential::new("pw")).is_err());
    }

    #[test]
    fn cgpa_updates_persist() {
        let (_dir, db) = temp_db();
        let id = insert_student(&db, &new_student("a@school.edu"), &Credential::new("pw")).unwrap();
        update_cgpa(&db, id, 2.53).unwrap();
        assert_eq!(query_student(&db, id).unwrap().unwrap().cgpa, 2.53);
    }
}
