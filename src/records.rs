use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::auth::Credential;
use crate::error::PortalError;
use crate::grading;
use crate::models::{Course, NewResult, NewStudent, Student};
use crate::srdb::{self, Db};

/// Creates a student and assigns every course at their level and semester for
/// `session`. Returns the student and how many courses were assigned.
pub fn create_student(db: &Db, new: &NewStudent, session: &str) -> Result<(Student, usize)> {
    if new.name.trim().is_empty() {
        return Err(PortalError::MissingField("name").into());
    }
    if new.email.trim().is_empty() {
        return Err(PortalError::MissingField("email").into());
    }
    if new.password.is_empty() {
        return Err(PortalError::MissingField("password").into());
    }
    if srdb::users::email_exists(db, &new.email)? {
        return Err(PortalError::DuplicateEmail(new.email.clone()).into());
    }

    let id = srdb::users::insert_student(db, new, &Credential::new(&new.password))
        .with_context(|| format!("Error adding student {}", new.email))?;

    let courses = srdb::courses::query_courses_for_placement(db, new.level, new.semester)?;
    let mut assigned = 0;
    for course in &courses {
        if srdb::courses::insert_assignment(db, id, course.id, session)? {
            assigned += 1;
        }
    }
    log::info!("[create_student] Assigned {assigned} course(s) to {} for {session}", new.email);

    let student = srdb::users::query_student(db, id)?
        .with_context(|| format!("Student {} vanished after insert", new.email))?;

    Ok((student, assigned))
}

/// What a batch of score entries did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpsertSummary {
    pub updated: usize,
    pub inserted: usize,
    /// Entries whose score didn't parse as an integer in `[0, 100]`.
    pub skipped: usize,
    pub cgpa: f64,
}

/// Applies a batch of `(course, score)` entries to one student's results.
///
/// Existing results for the same subject (course name) are overwritten in
/// place; the rest are inserted together at the end. Entries with a bad score
/// are skipped. The student's CGPA is then recomputed from all their results
/// and stored.
pub fn submit_results(
    db: &Db,
    student: &Student,
    entries: &[(Course, String)],
    session: &str,
) -> Result<UpsertSummary> {
    let mut summary = UpsertSummary::default();
    // Keyed by subject so a repeated course in one batch keeps its last score.
    let mut staged: Vec<NewResult> = Vec::new();
    let mut staged_index: HashMap<String, usize> = HashMap::new();

    for (course, raw_score) in entries {
        let Some(score) = grading::parse_score(raw_score) else {
            log::debug!("[submit_results] Skipping {} for {}: bad score '{raw_score}'", course.code, student.email);
            summary.skipped += 1;
            continue;
        };
        let grade = grading::grade_for(score);

        if let Some(&index) = staged_index.get(&course.name) {
            staged[index].score = score;
            staged[index].grade = grade;
            continue;
        }

        match srdb::results::query_result_by_subject(db, student.id, &course.name)? {
            Some(existing) => {
                srdb::results::update_result_score(db, existing.id, score, grade)
                    .with_context(|| format!("Error updating {} for {}", course.name, student.email))?;
                summary.updated += 1;
            }
            None => {
                staged_index.insert(course.name.clone(), staged.len());
                staged.push(NewResult {
                    student_id: student.id,
                    subject: course.name.clone(),
                    score,
                    grade,
                    level: student.level,
                    semester: student.semester,
                    session: session.to_string(),
                });
            }
        }
    }

    summary.inserted = srdb::results::insert_results(db, &staged)
        .with_context(|| format!("Error adding results for {}", student.email))?;
    summary.cgpa = refresh_cgpa(db, student.id)?;

    log::info!(
        "[submit_results] {}: {} updated, {} inserted, {} skipped, CGPA {:.2}",
        student.email, summary.updated, summary.inserted, summary.skipped, summary.cgpa
    );

    Ok(summary)
}

/// Recomputes a student's CGPA from every result they have and stores it.
pub fn refresh_cgpa(db: &Db, student_id: i64) -> Result<f64> {
    let scores = srdb::results::query_scores_for_student(db, student_id)?;
    let cgpa = grading::cgpa_for(&scores);
    srdb::users::update_cgpa(db, student_id, cgpa)?;
    Ok(cgpa)
}
