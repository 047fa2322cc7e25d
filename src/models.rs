use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

/// Academic year tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    ND1,
    ND2,
    HND1,
    HND2,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::ND1, Level::ND2, Level::HND1, Level::HND2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::ND1 => "ND1",
            Level::ND2 => "ND2",
            Level::HND1 => "HND1",
            Level::HND2 => "HND2",
        }
    }
}

impl FromStr for Level {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ND1" => Ok(Level::ND1),
            "ND2" => Ok(Level::ND2),
            "HND1" => Ok(Level::HND1),
            "HND2" => Ok(Level::HND2),
            other => Err(anyhow!("Unknown level: {other} (expected ND1, ND2, HND1 or HND2)")),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::First => "first",
            Semester::Second => "second",
        }
    }
}

impl FromStr for Semester {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" | "1" => Ok(Semester::First),
            "second" | "2" => Ok(Semester::Second),
            other => Err(anyhow!("Unknown semester: {other} (expected first or second)")),
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Student => "student",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "student" => Ok(Role::Student),
            other => Err(anyhow!("Unknown role: {other}")),
        }
    }
}

/// Letter grade for a single score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl FromStr for Grade {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(anyhow!("Unknown grade: {other}")),
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Failed,
    Pending,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Success => "success",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Pending => "pending",
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(NotificationStatus::Success),
            "failed" => Ok(NotificationStatus::Failed),
            "pending" => Ok(NotificationStatus::Pending),
            other => Err(anyhow!("Unknown notification status: {other}")),
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anyone who can log in. Students additionally have a `Student` row view.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,

    pub level: Level,
    pub semester: Semester,

    /// Cached; rewritten whenever the student's results change.
    pub cgpa: f64,
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} <{}> {} {} semester, CGPA {:.2}",
            self.name, self.email, self.level, self.semester, self.cgpa
        )
    }
}

/// Input for creating a student; the password is hashed before it is stored.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub level: Level,
    pub semester: Semester,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub level: Level,
    pub semester: Semester,
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {} ({} {} semester)", self.code, self.name, self.level, self.semester)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseAssignment {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub id: i64,
    pub student_id: i64,
    /// Course name, not course id.
    pub subject: String,
    pub score: u8,
    pub grade: Grade,
    pub level: Level,
    pub semester: Semester,
    pub session: String,
    pub created_at: String,
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.subject, self.score, self.grade)
    }
}

/// A result row that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResult {
    pub student_id: i64,
    pub subject: String,
    pub score: u8,
    pub grade: Grade,
    pub level: Level,
    pub semester: Semester,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationLog {
    pub id: i64,
    pub student_id: i64,
    pub phone: String,
    pub message: String,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub sent_at: String,
}

impl fmt::Display for NotificationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} -> {}", self.sent_at, self.status, self.phone)?;
        if let Some(err) = &self.error_message {
            write!(f, " ({err})")?;
        }
        Ok(())
    }
}
