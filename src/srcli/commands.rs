use crate::analytics::{self, StudentReport};
use crate::auth;
use crate::dispatch::{self, DispatchSummary, Target};
use crate::error::PortalError;
use crate::models::{NewStudent, NotificationStatus, Role};
use crate::records;
use crate::smsapi::Gateway;
use crate::srcli::Console;
use crate::srdb::{self, notifications::LogFilter};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;

const MAX_CMD_LENGTH: usize = 12;

struct CommandInstance<'a, G: Gateway> {
    console: &'a mut Console<G>,
    parameters: &'a [&'a str],
}

pub struct Commands;
impl Commands {
    pub async fn run_command<G: Gateway>(console: &mut Console<G>, input: &str) -> Result<String> {
        // Split the line (on whitespace) into:
        // - The command (first token)
        // - Its parameters (all tokens afterwards)
        let split_tokens = input.split_whitespace().collect::<Vec<_>>();
        let Some((&command, parameters)) = split_tokens.split_first() else {
            return Err(anyhow!("Empty command, see `help` for commands."));
        };

        let mut cmd = CommandInstance { console, parameters };

        // Execute the command
        let result: String = match command {
                 "help" => Self::get_help(),
                "login" => cmd.login()?,
               "logout" => cmd.logout(),
               "whoami" => cmd.whoami()?,
            "myresults" => cmd.my_results()?,
             "students" => cmd.students()?,
           "addstudent" => cmd.add_student()?,
            "addcourse" => cmd.add_course()?,
              "courses" => cmd.courses()?,
             "assigned" => cmd.assigned()?,
              "results" => cmd.results()?,
               "notify" => cmd.notify().await?,
               "resend" => cmd.resend().await?,
                 "logs" => cmd.logs()?,
            "analytics" => cmd.analytics()?,
            _ => {
                if Commands::is_valid_cmd(command) {
                    log::info!("User submitted unknown command: {}", command);
                    return Err(anyhow!(
                        "No such command found: {}, see `help` for commands.",
                        command
                    ));
                } else {
                    log::info!("User submitted invalid command: {}", command);
                    return Err(anyhow!("Invalid command syntax."));
                }
            }
        };

        Ok(result)
    }
}

impl<G: Gateway> CommandInstance<'_, G> {
    fn login(&mut self) -> Result<String> {
        let [email, password] = self.parameters else {
            return Err(anyhow!("Expected usage: `login <email> <password>`"));
        };

        let session = auth::login(&self.console.db, email, password)?;
        let greeting = format!("Welcome, {} ({}).", session.account.name, session.account.role.as_str());
        self.console.session = Some(session);

        Ok(greeting)
    }

    fn logout(&mut self) -> String {
        match self.console.session.take() {
            Some(session) => {
                log::info!("[logout] {} logged out", session.account.email);
                String::from("Logged out.")
            }
            None => String::from("Nobody is logged in."),
        }
    }

    fn whoami(&self) -> Result<String> {
        let session = self.console.current()?;
        Ok(format!(
            "{} <{}> ({}), logged in since {}",
            session.account.name,
            session.account.email,
            session.account.role.as_str(),
            session.started_at.format("%Y-%m-%d %H:%M UTC")
        ))
    }

    fn my_results(&self) -> Result<String> {
        let account = self.console.current()?.require(Role::Student)?;
        Ok(StudentReport::for_student(&self.console.db, account.id)?.to_string())
    }

    fn students(&self) -> Result<String> {
        self.require_admin()?;

        let students = srdb::users::query_students(&self.console.db)?;
        if students.is_empty() {
            return Ok(String::from("No students yet."));
        }

        let result_counts = srdb::results::query_all_results(&self.console.db)?
            .into_iter()
            .counts_by(|r| r.student_id);

        let mut output = String::from("**Students:**");
        for student in students {
            let results = result_counts.get(&student.id).copied().unwrap_or_default();
            output += &format!("\n\t{student}, {results} result(s)");
        }

        Ok(output)
    }

    fn add_student(&self) -> Result<String> {
        self.require_admin()?;
        let usage = "Expected usage: `addstudent name=<name> email=<email> password=<password> \
                     [phone=<phone>] level=<ND1|ND2|HND1|HND2> semester=<first|second>`";

        let fields = parse_fields(self.parameters).context(usage)?;
        let field = |key: &'static str| -> Result<String> {
            fields
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!(PortalError::MissingField(key)).context(usage))
        };

        let new = NewStudent {
            name: field("name")?,
            email: field("email")?,
            password: field("password")?,
            phone: field("phone").ok(),
            level: field("level")?.parse()?,
            semester: field("semester")?.parse()?,
        };

        let (student, assigned) = records::create_student(&self.console.db, &new, &self.console.academic_session)?;
        Ok(format!(
            "Added {} with {} course(s) for {}.",
            student, assigned, self.console.academic_session
        ))
    }

    fn add_course(&self) -> Result<String> {
        self.require_admin()?;

        let [code, level, semester, name @ ..] = self.parameters else {
            return Err(anyhow!("Expected usage: `addcourse <code> <level> <semester> <name>`"));
        };
        if name.is_empty() {
            return Err(PortalError::MissingField("name").into());
        }

        let name = name.join(" ");
        srdb::courses::insert_course(&self.console.db, &name, code, level.parse()?, semester.parse()?)
            .with_context(|| format!("Could not add course {code}"))?;
        log::info!("[add_course] Added course {code} ({name})");

        Ok(format!("Added course `{code}` {name}."))
    }

    fn courses(&self) -> Result<String> {
        self.require_admin()?;

        let courses = srdb::courses::query_courses(&self.console.db)?;
        if courses.is_empty() {
            return Ok(String::from("No courses yet."));
        }

        let mut output = String::from("**Courses:**");
        for course in courses {
            output += "\n\t";
            output += &course.to_string();
        }

        Ok(output)
    }

    fn assigned(&self) -> Result<String> {
        self.require_admin()?;
        let email = self.parameters
            .first()
            .context("Expected usage: `assigned <student email>`")?;

        let student = self.student_by_email(email)?;
        let courses = srdb::courses::query_assigned_courses(&self.console.db, &student)?;
        if courses.is_empty() {
            return Ok(format!("{} has no assigned courses.", student.name));
        }

        let mut output = format!("**Courses for {}:**", student.name);
        for (course, score) in courses {
            output += &format!(
                "\n\t{course}: {}",
                score.map_or_else(|| String::from("no score"), |s| s.to_string())
            );
        }

        Ok(output)
    }

    fn results(&self) -> Result<String> {
        self.require_admin()?;
        let usage = "Expected usage: `results <student email> <course code>=<score> ...`";

        let (email, raw_entries) = self.parameters.split_first().context(usage)?;
        if raw_entries.is_empty() {
            return Err(anyhow!(usage));
        }

        let student = self.student_by_email(email)?;

        let mut entries = Vec::new();
        let mut unknown = Vec::new();
        for raw in raw_entries {
            let (code, score) = raw.split_once('=').with_context(|| format!("{usage}\n(bad entry `{raw}`)"))?;
            match srdb::courses::query_course_by_code(&self.console.db, code.trim())? {
                Some(course) => entries.push((course, score.to_string())),
                None => {
                    log::warn!("[results] Unknown course code {code}, skipping.");
                    unknown.push(code.trim());
                }
            }
        }

        if entries.is_empty() && !unknown.is_empty() {
            return Err(PortalError::UnknownCourse(unknown.join(", ")).into());
        }

        let summary = records::submit_results(&self.console.db, &student, &entries, &self.console.academic_session)?;

        let mut output = format!(
            "Results updated for {}: {} updated, {} added, {} skipped. CGPA is now {:.2}.",
            student.name, summary.updated, summary.inserted, summary.skipped, summary.cgpa
        );
        if !unknown.is_empty() {
            output += &format!("\nUnknown course codes ignored: {}", unknown.join(", "));
        }

        Ok(output)
    }

    async fn notify(&self) -> Result<String> {
        self.require_admin()?;
        let gateway = self.console.gateway()?;

        let target = match self.parameters {
            [] | ["all"] => Target::All,
            emails => {
                let mut ids = Vec::new();
                for email in emails {
                    ids.push(self.student_by_email(email)?.id);
                }
                Target::Students(ids)
            }
        };

        let summary = dispatch::send_result_notifications(&self.console.db, gateway, &target).await?;
        Ok(describe_dispatch("Notifications sent!", &summary))
    }

    async fn resend(&self) -> Result<String> {
        self.require_admin()?;
        let gateway = self.console.gateway()?;

        let summary = dispatch::resend_failed(&self.console.db, gateway).await?;
        if summary == DispatchSummary::default() {
            return Ok(String::from("No failed notifications to resend."));
        }

        Ok(describe_dispatch("Failed notifications resent.", &summary))
    }

    fn logs(&self) -> Result<String> {
        self.require_admin()?;

        let filter = match self.parameters.first() {
            None | Some(&"all") => LogFilter::All,
            Some(status) => LogFilter::Status(
                status.parse::<NotificationStatus>()
                    .context("Expected usage: `logs [all|success|failed|pending]`")?,
            ),
        };

        let logs = srdb::notifications::query_logs(&self.console.db, filter)?;
        if logs.is_empty() {
            return Ok(String::from("No notification logs."));
        }

        let mut output = String::from("**SMS logs:**");
        for log in logs {
            output += "\n\t";
            output += &log.to_string();
        }

        Ok(output)
    }

    fn analytics(&self) -> Result<String> {
        self.require_admin()?;
        Ok(analytics::summarize(&self.console.db)?.to_string())
    }

    fn require_admin(&self) -> Result<()> {
        self.console.current()?.require(Role::Admin)?;
        Ok(())
    }

    fn student_by_email(&self, email: &str) -> Result<crate::models::Student> {
        srdb::users::query_student_by_email(&self.console.db, email)?
            .ok_or_else(|| PortalError::UnknownStudent(email.to_string()).into())
    }
}

/// Splits `key=value` tokens. A token without `=` continues the previous value,
/// so `name=Ada Obi` keeps the space.
fn parse_fields<'a>(tokens: &[&'a str]) -> Result<Vec<(&'a str, String)>> {
    let mut fields: Vec<(&'a str, String)> = Vec::new();

    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) => fields.push((key.trim(), value.to_string())),
            None => {
                let (_, value) = fields
                    .last_mut()
                    .ok_or_else(|| anyhow!("Expected `key=value`, got `{token}`"))?;
                value.push(' ');
                value.push_str(token);
            }
        }
    }

    Ok(fields)
}

fn describe_dispatch(headline: &str, summary: &DispatchSummary) -> String {
    let mut output = format!(
        "{headline} {} delivered, {} failed, {} skipped (no results).",
        summary.sent, summary.failed, summary.skipped
    );
    if summary.errors > 0 {
        output += &format!("\n{} student(s) could not be processed; see the logs.", summary.errors);
    }
    output
}

/// Non-async helpers
impl Commands {
    /// Ensures that the string slice conforms to C-like identifier regex
    fn is_valid_cmd(s: &str) -> bool {
        s.len() <= MAX_CMD_LENGTH
            && regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$")
                .is_ok_and(|re| re.is_match(s))
    }

    /// Gets a help string. Should be updated after a new command is added
    pub fn get_help() -> String {
        String::from(
            r#"
**Command List:**
`login <email> <password>`:  Log in.
`logout`:  Log out.
`whoami`:  Show who is logged in.
`myresults`:  (student) Show your results, average, CGPA and standing.
`students`:  (admin) List all students.
`addstudent name=.. email=.. password=.. [phone=..] level=.. semester=..`:  (admin) Add a student and assign their courses.
`addcourse <code> <level> <semester> <name>`:  (admin) Add a course.
`courses`:  (admin) List all courses.
`assigned <email>`:  (admin) List a student's assigned courses and scores.
`results <email> <code>=<score> ...`:  (admin) Enter or update scores.
`notify all | notify <email> ...`:  (admin) Text students their result summary.
`resend`:  (admin) Resend to students whose last notification failed.
`logs [all|success|failed|pending]`:  (admin) Show SMS logs.
`analytics`:  (admin) Portal statistics.
`help`:  Get information on supported commands
"#,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::RecordingGateway;
    use crate::srdb::testing::temp_db;
    use tempfile::TempDir;

    async fn admin_console() -> (TempDir, Console<RecordingGateway>) {
        let (dir, db) = temp_db();
        auth::seed_admin(&db, "Admin", "admin@school.edu", "adminpw").unwrap();
        let mut console = Console::new(db, Some(RecordingGateway::default()), "2023/2024");
        let reply = console.handle_line("login admin@school.edu adminpw").await;
        assert_eq!(reply, "Welcome, Admin (admin).");
        (dir, console)
    }

    #[test]
    fn fields_keep_spaces_in_values() {
        let fields = parse_fields(&["name=Ada", "Obi", "level=ND1"]).unwrap();
        assert_eq!(fields, vec![("name", String::from("Ada Obi")), ("level", String::from("ND1"))]);
        assert!(parse_fields(&["Ada"]).is_err());
    }

    #[test]
    fn command_names_are_identifiers() {
        assert!(Commands::is_valid_cmd("analytics"));
        assert!(!Commands::is_valid_cmd("drop;table"));
        assert!(!Commands::is_valid_cmd("averyveryverylongcommand"));
    }

    #[tokio::test]
    async fn unknown_and_invalid_commands() {
        let (_dir, db) = temp_db();
        let mut console: Console<RecordingGateway> = Console::new(db, None, "s");
        assert_eq!(
            console.handle_line("frobnicate").await,
            "Error: No such command found: frobnicate, see `help` for commands."
        );
        assert_eq!(console.handle_line("$$$").await, "Error: Invalid command syntax.");
        assert!(console.handle_line("help").await.contains("**Command List:**"));
    }

    #[tokio::test]
    async fn admin_commands_need_an_admin() {
        let (_dir, db) = temp_db();
        let mut console: Console<RecordingGateway> = Console::new(db, None, "s");
        assert_eq!(console.handle_line("students").await, "Error: You need to log in first");
        assert_eq!(console.handle_line("login nobody@x.edu pw").await, "Error: Invalid email or password");
    }

    #[tokio::test]
    async fn full_admin_and_student_flow() {
        let (_dir, mut console) = admin_console().await;

        assert_eq!(console.handle_line("addcourse MTH101 ND1 first Mathematics").await, "Added course `MTH101` Mathematics.");
        console.handle_line("addcourse PHY101 ND1 first Physics").await;
        console.handle_line("addcourse CHM101 ND1 first General Chemistry").await;
        console.handle_line("addcourse STA201 ND2 first Statistics").await;

        let reply = console
            .handle_line("addstudent name=Ada Obi email=ada@school.edu password=pw phone=2348012345678 level=ND1 semester=first")
            .await;
        assert!(reply.starts_with("Added Ada Obi <ada@school.edu>"), "{reply}");
        assert!(reply.contains("with 3 course(s) for 2023/2024"), "{reply}");

        let reply = console.handle_line("results ada@school.edu MTH101=80 PHY101=60 CHM101=50 XYZ999=70").await;
        assert!(reply.contains("0 updated, 3 added, 0 skipped. CGPA is now 2.53."), "{reply}");
        assert!(reply.contains("Unknown course codes ignored: XYZ999"), "{reply}");

        let reply = console.handle_line("assigned ada@school.edu").await;
        assert!(reply.contains("General Chemistry (ND1 first semester): 50"), "{reply}");

        let reply = console.handle_line("notify all").await;
        assert_eq!(reply, "Notifications sent! 1 delivered, 0 failed, 0 skipped (no results).");

        let reply = console.handle_line("logs success").await;
        assert!(reply.contains("success -> 2348012345678"), "{reply}");

        assert_eq!(console.handle_line("resend").await, "No failed notifications to resend.");
        assert!(console.handle_line("analytics").await.contains("Students: 1 (1 with results)"));

        assert_eq!(console.handle_line("logout").await, "Logged out.");
        assert!(console.session().is_none());

        assert_eq!(console.handle_line("login ada@school.edu pw").await, "Welcome, Ada Obi (student).");
        let reply = console.handle_line("myresults").await;
        assert!(reply.contains("Average: 63.3%"), "{reply}");
        assert!(reply.contains("CGPA: 2.53"), "{reply}");
        assert_eq!(console.handle_line("students").await, "Error: This command requires the admin role");
    }

    #[tokio::test]
    async fn notify_without_gateway_sends_nothing() {
        let (_dir, db) = temp_db();
        auth::seed_admin(&db, "Admin", "admin@school.edu", "adminpw").unwrap();
        let mut console: Console<RecordingGateway> = Console::new(db, None, "s");
        console.handle_line("login admin@school.edu adminpw").await;

        assert_eq!(
            console.handle_line("notify all").await,
            "Error: SMS gateway is not configured (set SENDCHAMP_API_KEY)"
        );
        assert_eq!(console.handle_line("logs").await, "No notification logs.");
    }

    #[tokio::test]
    async fn notify_unknown_student_is_rejected() {
        let (_dir, mut console) = admin_console().await;
        assert_eq!(
            console.handle_line("notify ghost@school.edu").await,
            "Error: No student found for ghost@school.edu"
        );
    }

    #[tokio::test]
    async fn results_with_only_unknown_codes_fail() {
        let (_dir, mut console) = admin_console().await;
        console.handle_line("addstudent name=Ada email=ada@school.edu password=pw level=ND1 semester=first").await;
        assert_eq!(
            console.handle_line("results ada@school.edu XYZ999=70").await,
            "Error: No course found with code XYZ999"
        );
        assert!(console.handle_line("students").await.contains("Ada <ada@school.edu> ND1 first semester, CGPA 0.00, 0 result(s)"));
    }

    #[tokio::test]
    async fn addstudent_reports_missing_fields() {
        let (_dir, mut console) = admin_console().await;
        let reply = console.handle_line("addstudent name=Ada email=ada@school.edu level=ND1 semester=first").await;
        assert!(reply.starts_with("Error: Expected usage: `addstudent"), "{reply}");
    }
}
