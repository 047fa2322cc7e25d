use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::Result;
use itertools::Itertools;

use crate::grading::{self, Standing};
use crate::models::{Grade, Level, NotificationStatus, ResultRecord};
use crate::srdb::{self, Db};

/// Portal-wide numbers for the admin overview.
#[derive(Debug, Clone, PartialEq)]
pub struct Analytics {
    pub total_students: usize,
    pub students_with_results: usize,
    /// Mean of the cached CGPAs; 0.0 with no students.
    pub average_cgpa: f64,
    pub grade_distribution: BTreeMap<Grade, usize>,
    pub level_distribution: BTreeMap<Level, usize>,
    pub standings: BTreeMap<Standing, usize>,
    pub total_results: usize,
    pub successful_sms: usize,
    pub failed_sms: usize,
}

impl Analytics {
    /// Percentage of send attempts that succeeded, rounded; 0 with no attempts.
    pub fn sms_success_rate(&self) -> u32 {
        let attempts = self.successful_sms + self.failed_sms;
        if attempts == 0 {
            return 0;
        }
        (self.successful_sms as f64 / attempts as f64 * 100.0).round() as u32
    }
}

impl fmt::Display for Analytics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**Analytics:**")?;
        writeln!(f, "\tStudents: {} ({} with results)", self.total_students, self.students_with_results)?;
        writeln!(f, "\tAverage CGPA: {:.2}", self.average_cgpa)?;
        writeln!(f, "\tResults recorded: {}", self.total_results)?;

        let grades = self.grade_distribution.iter().map(|(g, n)| format!("{g}: {n}")).join(", ");
        writeln!(f, "\tGrades: {}", if grades.is_empty() { "none" } else { grades.as_str() })?;

        let levels = self.level_distribution.iter().map(|(l, n)| format!("{l}: {n}")).join(", ");
        writeln!(f, "\tLevels: {}", if levels.is_empty() { "none" } else { levels.as_str() })?;

        let standings = self.standings.iter().map(|(s, n)| format!("{}: {n}", s.label())).join(", ");
        writeln!(f, "\tStanding: {}", if standings.is_empty() { "none" } else { standings.as_str() })?;

        write!(
            f,
            "\tSMS: {} delivered, {} failed ({}% success)",
            self.successful_sms, self.failed_sms, self.sms_success_rate()
        )
    }
}

pub fn summarize(db: &Db) -> Result<Analytics> {
    let students = srdb::users::query_students(db)?;
    let results = srdb::results::query_all_results(db)?;

    let with_results: HashSet<i64> = results.iter().map(|r| r.student_id).collect();

    let average_cgpa = if students.is_empty() {
        0.0
    } else {
        students.iter().map(|s| s.cgpa).sum::<f64>() / students.len() as f64
    };

    Ok(Analytics {
        total_students: students.len(),
        students_with_results: students.iter().filter(|s| with_results.contains(&s.id)).count(),
        average_cgpa,
        grade_distribution: results.iter().map(|r| r.grade).counts().into_iter().collect(),
        level_distribution: students.iter().map(|s| s.level).counts().into_iter().collect(),
        standings: students.iter().map(|s| Standing::for_cgpa(s.cgpa)).counts().into_iter().collect(),
        total_results: results.len(),
        successful_sms: srdb::notifications::count_by_status(db, NotificationStatus::Success)?,
        failed_sms: srdb::notifications::count_by_status(db, NotificationStatus::Failed)?,
    })
}

/// Average score per subject, by subject name.
pub fn subject_averages(results: &[ResultRecord]) -> BTreeMap<String, f64> {
    results
        .iter()
        .into_group_map_by(|r| r.subject.clone())
        .into_iter()
        .filter_map(|(subject, rows)| {
            let scores: Vec<u8> = rows.iter().map(|r| r.score).collect();
            grading::average_score(&scores).map(|avg| (subject, avg))
        })
        .collect()
}

/// What a student sees about their own results.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentReport {
    pub results: Vec<ResultRecord>,
    pub average: Option<f64>,
    pub cgpa: f64,
    pub standing: Standing,
}

impl StudentReport {
    /// Builds the report from the student's results, newest first.
    pub fn for_student(db: &Db, student_id: i64) -> Result<Self> {
        let results = srdb::results::query_results_for_student(db, student_id)?;
        let scores: Vec<u8> = results.iter().map(|r| r.score).collect();
        let cgpa = grading::cgpa_for(&scores);

        Ok(Self {
            average: grading::average_score(&scores),
            cgpa,
            standing: Standing::for_cgpa(cgpa),
            results,
        })
    }
}

impl fmt::Display for StudentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return write!(f, "No results have been published yet.");
        }

        writeln!(f, "**Your results:**")?;
        for result in &self.results {
            writeln!(f, "\t{result}")?;
        }
        writeln!(f, "Average: {:.1}%", self.average.unwrap_or_default())?;
        writeln!(f, "CGPA: {:.2}", self.cgpa)?;
        write!(f, "Standing: {}. {}", self.standing.label(), self.standing.advice())
    }
}
