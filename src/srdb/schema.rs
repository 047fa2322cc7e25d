pub const USERS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Users (
        id             INTEGER     PRIMARY KEY,
        name           TEXT        NOT NULL,
        email          TEXT        NOT NULL    UNIQUE,

        password_salt  TEXT        NOT NULL,
        password_hash  TEXT        NOT NULL,

        phone          TEXT,
        role           TEXT        NOT NULL,
        level          TEXT,
        semester       TEXT,
        cgpa           REAL        NOT NULL    DEFAULT 0,

        created_at     TIMESTAMP   NOT NULL
    )";

pub const COURSES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Courses (
        id             INTEGER     PRIMARY KEY,
        name           TEXT        NOT NULL,
        code           TEXT        NOT NULL    UNIQUE,
        level          TEXT        NOT NULL,
        semester       TEXT        NOT NULL,

        created_at     TIMESTAMP   NOT NULL
    )";

pub const STUDENT_COURSES_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS StudentCourses (
        id             INTEGER     PRIMARY KEY,
        student_id     INTEGER     NOT NULL    REFERENCES Users(id),
        course_id      INTEGER     NOT NULL    REFERENCES Courses(id),
        session        TEXT        NOT NULL,

        created_at     TIMESTAMP   NOT NULL,

        UNIQUE (student_id, course_id, session)
    )";

// Uniqueness of (student_id, subject) is kept by the upsert, not the table.
pub const RESULTS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS Results (
        id             INTEGER     PRIMARY KEY,
        student_id     INTEGER     NOT NULL    REFERENCES Users(id),
        subject        TEXT        NOT NULL,
        score          INTEGER     NOT NULL    CHECK (score BETWEEN 0 AND 100),
        grade          TEXT        NOT NULL,
        level          TEXT        NOT NULL,
        semester       TEXT        NOT NULL,
        session        TEXT        NOT NULL,

        created_at     TIMESTAMP   NOT NULL
    )";

pub const SMS_LOGS_SCHEMA: &str =
    "CREATE TABLE IF NOT EXISTS SmsLogs (
        id             INTEGER     PRIMARY KEY,
        student_id     INTEGER     NOT NULL    REFERENCES Users(id),
        phone          TEXT        NOT NULL,
        message        TEXT        NOT NULL,
        status         TEXT        NOT NULL,
        error_message  TEXT,

        sent_at        TIMESTAMP   NOT NULL
    )";
