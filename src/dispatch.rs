use anyhow::{Context, Result};

use crate::grading;
use crate::models::{NotificationStatus, Student};
use crate::smsapi::Gateway;
use crate::srdb::{self, Db};

/// Which students a dispatch covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Students(Vec<i64>),
}

/// Tally of one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub sent: usize,
    pub failed: usize,
    /// Students with no results; nothing was sent or logged for them.
    pub skipped: usize,
    /// Students whose results or log row couldn't be read or written.
    pub errors: usize,
}

impl DispatchSummary {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }
}

/// The result summary text for a student, or `None` if they have no scores.
pub fn compose_message(student: &Student, scores: &[u8]) -> Option<String> {
    let average = grading::average_score(scores)?;
    Some(format!(
        "Dear {}, your results are ready. Average: {:.1}%. CGPA: {:.2}. Check your portal for details.",
        student.name, average, student.cgpa
    ))
}

/// Sends each targeted student a summary of their results, one at a time in
/// roster order, and logs every attempt.
///
/// A failure for one student (gateway or store) is recorded and the run moves
/// on to the next student.
pub async fn send_result_notifications<G: Gateway>(
    db: &Db,
    gateway: &G,
    target: &Target,
) -> Result<DispatchSummary> {
    let students = match target {
        Target::All => srdb::users::query_students(db),
        Target::Students(ids) => srdb::users::query_students_by_ids(db, ids),
    }
    .context("Could not load students to notify")?;

    log::info!("[send_result_notifications] Notifying up to {} student(s)", students.len());

    let mut summary = DispatchSummary::default();
    for student in &students {
        match notify_student(db, gateway, student).await {
            Ok(Some(NotificationStatus::Success)) => summary.sent += 1,
            Ok(Some(_)) => summary.failed += 1,
            Ok(None) => summary.skipped += 1,
            Err(err) => {
                log::error!("[send_result_notifications] Could not notify {}: {err:#}", student.email);
                summary.errors += 1;
            }
        }
    }

    log::info!(
        "[send_result_notifications] Done: {} sent, {} failed, {} skipped, {} errors",
        summary.sent, summary.failed, summary.skipped, summary.errors
    );

    Ok(summary)
}

/// Re-runs the dispatch for every student whose latest log entry failed.
pub async fn resend_failed<G: Gateway>(db: &Db, gateway: &G) -> Result<DispatchSummary> {
    let ids = srdb::notifications::query_students_with_failed_latest(db)
        .context("Could not look up failed notifications")?;

    if ids.is_empty() {
        log::info!("[resend_failed] No failed notifications to resend.");
        return Ok(DispatchSummary::default());
    }

    log::info!("[resend_failed] Resending to {} student(s)", ids.len());
    send_result_notifications(db, gateway, &Target::Students(ids)).await
}

/// Sends and logs one student's notification. `Ok(None)` means they were
/// skipped for having no results.
async fn notify_student<G: Gateway>(
    db: &Db,
    gateway: &G,
    student: &Student,
) -> Result<Option<NotificationStatus>> {
    let scores = srdb::results::query_scores_for_student(db, student.id)?;
    let Some(message) = compose_message(student, &scores) else {
        log::trace!("[notify_student] {} has no results, skipping.", student.email);
        return Ok(None);
    };

    let phone = student.phone.clone().unwrap_or_default();
    let report = gateway.send(&phone, &message).await;

    let status = if report.success {
        NotificationStatus::Success
    } else {
        log::warn!(
            "[notify_student] SMS to {} failed: {}",
            student.email,
            report.error.as_deref().unwrap_or("unknown error")
        );
        NotificationStatus::Failed
    };

    srdb::notifications::insert_log(db, student.id, &phone, &message, status, report.error.as_deref())?;

    Ok(Some(status))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashSet;

    use crate::smsapi::{Gateway, SendReport};

    /// Records every send; numbers in `failing` are rejected.
    #[derive(Default)]
    pub struct RecordingGateway {
        pub sent: RefCell<Vec<(String, String)>>,
        pub failing: RefCell<HashSet<String>>,
    }

    impl RecordingGateway {
        pub fn failing(phones: &[&str]) -> Self {
            let gateway = Self::default();
            gateway.fail(phones);
            gateway
        }

        pub fn fail(&self, phones: &[&str]) {
            self.failing.borrow_mut().extend(phones.iter().map(|p| p.to_string()));
        }

        pub fn recover(&self) {
            self.failing.borrow_mut().clear();
        }

        pub fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl Gateway for RecordingGateway {
        async fn send(&self, phone: &str, message: &str) -> SendReport {
            self.sent.borrow_mut().push((phone.to_string(), message.to_string()));
            if phone.is_empty() {
                SendReport::failed("Phone number and message are required")
            } else if self.failing.borrow().contains(phone) {
                SendReport::failed("Rejected by provider")
            } else {
                SendReport::delivered()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingGateway;
    use super::*;
    use crate::models::{Course, Level, NewStudent, Semester};
    use crate::records;
    use crate::srdb::notifications::LogFilter;
    use crate::srdb::testing::temp_db;

    fn add_student(db: &Db, email: &str, phone: Option<&str>) -> Student {
        let new = NewStudent {
            name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
            phone: phone.map(str::to_string),
            level: Level::ND1,
            semester: Semester::First,
        };
        records::create_student(db, &new, "2023/2024").unwrap().0
    }

    fn give_results(db: &Db, student: &Student, scores: &[(&Course, &str)]) -> Student {
        let entries: Vec<_> = scores.iter().map(|(c, s)| ((*c).clone(), s.to_string())).collect();
        records::submit_results(db, student, &entries, "2023/2024").unwrap();
        srdb::users::query_student(db, student.id).unwrap().unwrap()
    }

    fn courses(db: &Db) -> (Course, Course, Course) {
        for (name, code) in [("Mathematics", "MTH101"), ("Physics", "PHY101"), ("Chemistry", "CHM101")] {
            srdb::courses::insert_course(db, name, code, Level::ND1, Semester::First).unwrap();
        }
        let get = |code| srdb::courses::query_course_by_code(db, code).unwrap().unwrap();
        (get("MTH101"), get("PHY101"), get("CHM101"))
    }

    #[test]
    fn message_contains_average_and_cached_cgpa() {
        let student = Student {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@school.edu".to_string(),
            phone: None,
            level: Level::ND1,
            semester: Semester::First,
            cgpa: 2.53,
        };
        assert_eq!(
            compose_message(&student, &[80, 60, 50]).unwrap(),
            "Dear Ada, your results are ready. Average: 63.3%. CGPA: 2.53. Check your portal for details."
        );
        assert!(compose_message(&student, &[]).is_none());
    }

    #[tokio::test]
    async fn students_without_results_get_nothing() {
        let (_dir, db) = temp_db();
        add_student(&db, "idle@school.edu", Some("2348000000001"));
        let gateway = RecordingGateway::default();

        let summary = send_result_notifications(&db, &gateway, &Target::All).await.unwrap();

        assert_eq!(summary, DispatchSummary { skipped: 1, ..Default::default() });
        assert_eq!(gateway.calls(), 0);
        assert!(srdb::notifications::query_logs(&db, LogFilter::All).unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_rest() {
        let (_dir, db) = temp_db();
        let (maths, physics, chemistry) = courses(&db);
        let a = add_student(&db, "a@school.edu", Some("111"));
        let b = add_student(&db, "b@school.edu", Some("222"));
        let c = add_student(&db, "c@school.edu", None);
        give_results(&db, &a, &[(&maths, "80"), (&physics, "60"), (&chemistry, "50")]);
        give_results(&db, &b, &[(&maths, "70")]);
        give_results(&db, &c, &[(&maths, "90")]);

        let gateway = RecordingGateway::failing(&["111"]);
        let summary = send_result_notifications(&db, &gateway, &Target::All).await.unwrap();

        assert_eq!(summary, DispatchSummary { sent: 1, failed: 2, skipped: 0, errors: 0 });
        assert_eq!(summary.attempted(), 3);

        // Sequential, roster order; missing phone is passed through as empty.
        let phones: Vec<_> = gateway.sent.borrow().iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(phones, vec!["111", "222", ""]);

        let logs = srdb::notifications::query_logs(&db, LogFilter::All).unwrap();
        assert_eq!(logs.len(), 3);
        let a_log = logs.iter().find(|l| l.student_id == a.id).unwrap();
        assert_eq!(a_log.status, NotificationStatus::Failed);
        assert_eq!(a_log.error_message.as_deref(), Some("Rejected by provider"));
        assert!(a_log.message.contains("Average: 63.3%"));
        assert!(a_log.message.contains("CGPA: 2.53"));
    }

    #[tokio::test]
    async fn explicit_subset_only_reaches_those_students() {
        let (_dir, db) = temp_db();
        let (maths, _, _) = courses(&db);
        let a = add_student(&db, "a@school.edu", Some("111"));
        let b = add_student(&db, "b@school.edu", Some("222"));
        give_results(&db, &a, &[(&maths, "80")]);
        give_results(&db, &b, &[(&maths, "80")]);

        let gateway = RecordingGateway::default();
        let summary = send_result_notifications(&db, &gateway, &Target::Students(vec![b.id])).await.unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(gateway.sent.borrow()[0].0, "222");
    }

    #[tokio::test]
    async fn resend_targets_students_whose_latest_attempt_failed() {
        let (_dir, db) = temp_db();
        let (maths, _, _) = courses(&db);
        let a = add_student(&db, "a@school.edu", Some("111"));
        let b = add_student(&db, "b@school.edu", Some("222"));
        let c = add_student(&db, "c@school.edu", Some("333"));
        for student in [&a, &b, &c] {
            give_results(&db, student, &[(&maths, "75")]);
        }

        let gateway = RecordingGateway::failing(&["111", "222"]);
        send_result_notifications(&db, &gateway, &Target::All).await.unwrap();

        // a recovers through a later targeted send before the resend.
        gateway.recover();
        send_result_notifications(&db, &gateway, &Target::Students(vec![a.id])).await.unwrap();

        gateway.fail(&["222"]);
        let calls_before = gateway.calls();
        let summary = resend_failed(&db, &gateway).await.unwrap();

        assert_eq!(summary, DispatchSummary { sent: 0, failed: 1, skipped: 0, errors: 0 });
        let resent: Vec<_> = gateway.sent.borrow()[calls_before..].iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(resent, vec!["222"]);

        // One fresh attempt and one fresh log row per resend.
        let b_logs = srdb::notifications::query_logs_for_student(&db, b.id).unwrap();
        assert_eq!(b_logs.len(), 2);

        gateway.recover();
        let summary = resend_failed(&db, &gateway).await.unwrap();
        assert_eq!(summary.sent, 1);
        let summary = resend_failed(&db, &gateway).await.unwrap();
        assert_eq!(summary, DispatchSummary::default());
    }
}
