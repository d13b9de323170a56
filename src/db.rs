use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("classtrack.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tests(
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('pretest', 'posttest')),
            FOREIGN KEY(lesson_id) REFERENCES lessons(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tests_lesson ON tests(lesson_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL,
            question_text TEXT NOT NULL,
            total_marks INTEGER NOT NULL,
            question_order INTEGER NOT NULL,
            FOREIGN KEY(test_id) REFERENCES tests(id),
            UNIQUE(test_id, question_order)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_test ON questions(test_id)",
        [],
    )?;

    // Per-question marks: composite key (student, question), last write wins.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS raw_marks(
            student_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            scored INTEGER NOT NULL,
            PRIMARY KEY(student_id, question_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_raw_marks_question ON raw_marks(question_id)",
        [],
    )?;

    // One attendance event per student per day, last write wins.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('present', 'absent', 'late')),
            PRIMARY KEY(student_id, date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)",
        [],
    )?;

    Ok(conn)
}

/// Restore the dense 1..N question_order sequence for a test. Rows are
/// renumbered ascending, so a new value never exceeds the value it replaces
/// and the UNIQUE(test_id, question_order) constraint cannot trip mid-pass.
pub fn repack_question_order(conn: &Connection, test_id: &str) -> rusqlite::Result<()> {
    let mut stmt =
        conn.prepare("SELECT id FROM questions WHERE test_id = ? ORDER BY question_order, id")?;
    let ids: Vec<String> = stmt
        .query_map([test_id], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    for (i, question_id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE questions SET question_order = ? WHERE id = ?",
            ((i + 1) as i64, question_id),
        )?;
    }
    Ok(())
}
