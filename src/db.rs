use chrono::Local;
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock timestamp as stored in every `created_at` column.
/// The first 10 characters are always the calendar date.
pub fn now_ts() -> String {
    Local::now().format(TS_FORMAT).to_string()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn open_db(workspace: &Path, db_file: &str) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(db_file))?;
    migrate(&conn)?;
    seed_demo_accounts(&conn)?;
    Ok(conn)
}

/// Creates every table the daemon uses. Safe to run on each open.
pub fn migrate(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            login_id TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            grade TEXT,
            target_university TEXT,
            target_department TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parents(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parent_students(
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY(parent_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS study_sessions(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            grade TEXT NOT NULL,
            page_start INTEGER,
            page_end INTEGER,
            difficulty TEXT NOT NULL,
            exam_type TEXT NOT NULL,
            total_questions INTEGER NOT NULL,
            correct_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_study_sessions_columns(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_study_sessions_student ON study_sessions(student_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            prompt TEXT NOT NULL,
            answer TEXT NOT NULL,
            explanation TEXT NOT NULL,
            is_correct INTEGER,
            UNIQUE(session_id, position)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_session ON questions(session_id)",
        [],
    )?;

    let item_cols = (1..=20)
        .map(|i| format!("q{} INTEGER NOT NULL", i))
        .collect::<Vec<_>>()
        .join(",\n            ");
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS psych_checks(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            {},
            total_score INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
            item_cols
        ),
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_psych_checks_student ON psych_checks(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS vocab_entries(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            term TEXT NOT NULL,
            explanation TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vocab_entries_student ON vocab_entries(student_id, subject)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rank_cache(
            student_id TEXT PRIMARY KEY,
            total_score REAL NOT NULL DEFAULT 0,
            total_correct INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_study_goals(
            student_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            week_start TEXT NOT NULL,
            target_count INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(student_id, subject, week_start)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parent_consents(
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(parent_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS motivation_logs(
            id TEXT PRIMARY KEY,
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS monthly_books(
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            year_month TEXT NOT NULL,
            idx INTEGER NOT NULL,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY(parent_id, student_id, year_month, idx)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parent_goals(
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            goal_university TEXT NOT NULL,
            goal_department TEXT,
            goal_score REAL NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(parent_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS university_recommendations(
            id TEXT PRIMARY KEY,
            parent_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            score REAL NOT NULL,
            degree_type TEXT NOT NULL,
            region TEXT NOT NULL,
            track TEXT NOT NULL,
            university_name TEXT NOT NULL,
            department TEXT NOT NULL,
            avg_score REAL NOT NULL,
            min_score REAL NOT NULL,
            max_score REAL NOT NULL,
            gap REAL NOT NULL,
            url TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(parent_id, student_id, score, university_name, department)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_memos(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            memo TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teacher_memos_pair ON teacher_memos(teacher_id, student_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_plans(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            subject TEXT,
            grade TEXT,
            title TEXT NOT NULL,
            content TEXT,
            due_date TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // One cache for every generated coaching/report text, keyed by who asked,
    // about whom, what kind, and for which period.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS generation_logs(
            actor_role TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            student_id TEXT NOT NULL DEFAULT '',
            log_type TEXT NOT NULL,
            period_key TEXT NOT NULL,
            content TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(actor_role, actor_id, student_id, log_type, period_key)
        )",
        [],
    )?;

    Ok(())
}

fn ensure_study_sessions_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "study_sessions", "requested_count")? {
        conn.execute(
            "ALTER TABLE study_sessions ADD COLUMN requested_count INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        conn.execute(
            "UPDATE study_sessions SET requested_count = total_questions",
            [],
        )?;
    }
    if !table_has_column(conn, "study_sessions", "graded_at")? {
        conn.execute("ALTER TABLE study_sessions ADD COLUMN graded_at TEXT", [])?;
    }
    Ok(())
}

const DEMO_STUDENTS: [(&str, &str, &str, &str); 3] = [
    ("학생1", "student1", "pass1", "고1"),
    ("학생2", "student2", "pass2", "고2"),
    ("학생3", "student3", "pass3", "고3"),
];

const DEMO_PARENTS: [(&str, &str, &str); 3] = [
    ("학부모1", "parent1@test.com", "pass1"),
    ("학부모2", "parent2@test.com", "pass2"),
    ("학부모3", "parent3@test.com", "pass3"),
];

const DEMO_TEACHERS: [(&str, &str, &str); 3] = [
    ("김선생", "teacher1@test.com", "pass1"),
    ("이선생", "teacher2@test.com", "pass2"),
    ("박선생", "teacher3@test.com", "pass3"),
];

fn seed_demo_accounts(conn: &Connection) -> anyhow::Result<()> {
    let ts = now_ts();
    for (name, login_id, password, grade) in DEMO_STUDENTS {
        conn.execute(
            "INSERT OR IGNORE INTO students(id, name, login_id, password, grade)
             VALUES(?, ?, ?, ?, ?)",
            (new_id(), name, login_id, password, grade),
        )?;
    }
    for (name, email, password) in DEMO_PARENTS {
        conn.execute(
            "INSERT OR IGNORE INTO parents(id, name, email, password, created_at)
             VALUES(?, ?, ?, ?, ?)",
            (new_id(), name, email, password, &ts),
        )?;
    }
    for (name, email, password) in DEMO_TEACHERS {
        conn.execute(
            "INSERT OR IGNORE INTO teachers(id, name, email, password, created_at)
             VALUES(?, ?, ?, ?, ?)",
            (new_id(), name, email, password, &ts),
        )?;
    }

    // parentN looks after studentN.
    for n in 1..=DEMO_STUDENTS.len() {
        conn.execute(
            "INSERT OR IGNORE INTO parent_students(parent_id, student_id, created_at)
             SELECT p.id, s.id, ?
             FROM parents p, students s
             WHERE p.email = ? AND s.login_id = ?",
            (&ts, format!("parent{}@test.com", n), format!("student{}", n)),
        )?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO rank_cache(student_id, total_score, total_correct, updated_at)
         SELECT id, 0, 0, ? FROM students",
        [&ts],
    )?;
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn student_exists(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM students WHERE id = ?",
        [student_id],
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    migrate(&conn).expect("migrate");
    seed_demo_accounts(&conn).expect("seed");
    conn
}
