use crate::auth;
use crate::models::{
    ClassData, Extracurricular, ExtracurricularPredicate, GradePredicate, LearningObjective,
    ParentAddress, Role, Student, StudentAttendance, StudentCoCurricular, StudentExtracurricular,
    StudentFamilyData, StudentSubjectGrade, Subject, Teacher, TpGrades,
};
use crate::report::ReportSources;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;

pub const DB_FILE: &str = "raport.sqlite3";
const SEEDED_KEY: &str = "workspace.seeded";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            nip TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            teacher_id TEXT NOT NULL DEFAULT '',
            fase TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            nis TEXT NOT NULL DEFAULT '',
            nisn TEXT NOT NULL DEFAULT '',
            class_id TEXT NOT NULL,
            gender TEXT NOT NULL DEFAULT 'L',
            birth_date TEXT NOT NULL DEFAULT '',
            birth_place TEXT NOT NULL DEFAULT '',
            religion TEXT NOT NULL DEFAULT '',
            previous_education TEXT NOT NULL DEFAULT '',
            student_address TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_family_data(
            student_id TEXT PRIMARY KEY,
            father_name TEXT NOT NULL DEFAULT '',
            father_job TEXT NOT NULL DEFAULT '',
            mother_name TEXT NOT NULL DEFAULT '',
            mother_job TEXT NOT NULL DEFAULT '',
            parent_address TEXT NOT NULL DEFAULT '{}',
            parent_phone TEXT NOT NULL DEFAULT '',
            guardian_name TEXT NOT NULL DEFAULT '',
            guardian_job TEXT NOT NULL DEFAULT '',
            guardian_address TEXT NOT NULL DEFAULT '',
            guardian_phone TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS learning_objectives(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL,
            description TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_learning_objectives_subject_class
         ON learning_objectives(subject_id, class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_predicates(
            id TEXT PRIMARY KEY,
            threshold INTEGER NOT NULL,
            description TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS extracurriculars(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS extracurricular_predicates(
            id TEXT PRIMARY KEY,
            extracurricular_id TEXT NOT NULL,
            predicate TEXT NOT NULL,
            description TEXT NOT NULL,
            FOREIGN KEY(extracurricular_id) REFERENCES extracurriculars(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_subject_grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            tp_grades TEXT NOT NULL DEFAULT '{}',
            summative_grades TEXT NOT NULL DEFAULT '[]',
            final_exam_score REAL,
            updated_at TEXT,
            UNIQUE(student_id, subject_id, class_id),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(subject_id) REFERENCES subjects(id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_class_subject
         ON student_subject_grades(class_id, subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_extracurriculars(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            extracurricular_id TEXT NOT NULL,
            predicate TEXT NOT NULL,
            UNIQUE(student_id, extracurricular_id),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(extracurricular_id) REFERENCES extracurriculars(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_attendances(
            student_id TEXT PRIMARY KEY,
            present INTEGER NOT NULL DEFAULT 0,
            permitted INTEGER NOT NULL DEFAULT 0,
            unpermitted INTEGER NOT NULL DEFAULT 0,
            teacher_note TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_cocurriculars(
            student_id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE
        )",
        [],
    )?;

    seed_defaults(&conn)?;

    Ok(conn)
}

/// First open of a workspace: an admin login and the usual predicate bands.
fn seed_defaults(conn: &Connection) -> anyhow::Result<()> {
    if settings_get_json(conn, SEEDED_KEY)?.is_some() {
        return Ok(());
    }
    let tx = conn.unchecked_transaction()?;

    let users: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if users == 0 {
        auth::insert_user(&tx, "admin", "admin", Role::Admin)?;
    }

    let predicates: i64 = tx.query_row("SELECT COUNT(*) FROM grade_predicates", [], |r| r.get(0))?;
    if predicates == 0 {
        for (threshold, description) in [
            (90, "Sangat Baik"),
            (80, "Baik"),
            (70, "Cukup"),
            (0, "Perlu Bimbingan"),
        ] {
            tx.execute(
                "INSERT INTO grade_predicates(id, threshold, description) VALUES(?, ?, ?)",
                (new_id(), threshold, description),
            )?;
        }
    }

    settings_set_json(&tx, SEEDED_KEY, &serde_json::json!(true))?;
    tx.commit()?;
    tracing::info!("seeded new workspace defaults");
    Ok(())
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// `subject-<n>` with `n` one past the largest numeric suffix in use.
pub fn next_subject_id(conn: &Connection) -> anyhow::Result<String> {
    let mut stmt = conn.prepare("SELECT id FROM subjects")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let max = ids
        .iter()
        .map(|id| crate::report::subject_order_key(id))
        .max()
        .unwrap_or(0);
    Ok(format!("subject-{}", max + 1))
}

pub fn exists(conn: &Connection, table: &str, key_col: &str, id: &str) -> anyhow::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE {} = ?", table, key_col);
    Ok(conn
        .query_row(&sql, [id], |r| r.get::<_, i64>(0))
        .optional()?
        .is_some())
}

const STUDENT_COLS: &str = "id, name, nis, nisn, class_id, gender, birth_date, birth_place,
    religion, previous_education, student_address";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        nis: r.get(2)?,
        nisn: r.get(3)?,
        class_id: r.get(4)?,
        gender: r.get(5)?,
        birth_date: r.get(6)?,
        birth_place: r.get(7)?,
        religion: r.get(8)?,
        previous_education: r.get(9)?,
        student_address: r.get(10)?,
    })
}

const FAMILY_COLS: &str = "student_id, father_name, father_job, mother_name, mother_job,
    parent_address, parent_phone, guardian_name, guardian_job, guardian_address, guardian_phone";

fn family_from_row(r: &Row<'_>) -> rusqlite::Result<StudentFamilyData> {
    let address_raw: String = r.get(5)?;
    let parent_address: ParentAddress = serde_json::from_str(&address_raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable parent_address, using empty address");
        ParentAddress::default()
    });
    Ok(StudentFamilyData {
        student_id: r.get(0)?,
        father_name: r.get(1)?,
        father_job: r.get(2)?,
        mother_name: r.get(3)?,
        mother_job: r.get(4)?,
        parent_address,
        parent_phone: r.get(6)?,
        guardian_name: r.get(7)?,
        guardian_job: r.get(8)?,
        guardian_address: r.get(9)?,
        guardian_phone: r.get(10)?,
    })
}

const GRADE_COLS: &str =
    "id, student_id, subject_id, class_id, tp_grades, summative_grades, final_exam_score";

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<StudentSubjectGrade> {
    let tp_raw: String = r.get(4)?;
    let summative_raw: String = r.get(5)?;
    let tp_grades: TpGrades = serde_json::from_str(&tp_raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "unreadable tp_grades, treating as ungraded");
        TpGrades::new()
    });
    let summative_grades: Vec<Option<f64>> =
        serde_json::from_str(&summative_raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unreadable summative_grades, treating as ungraded");
            Vec::new()
        });
    Ok(StudentSubjectGrade {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        class_id: r.get(3)?,
        tp_grades,
        summative_grades,
        final_exam_score: r.get(6)?,
    })
}

fn collect<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> anyhow::Result<Vec<T>>
where
    P: rusqlite::Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, f)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_users(conn: &Connection) -> anyhow::Result<Vec<crate::models::User>> {
    collect(
        conn,
        "SELECT id, username, role FROM users ORDER BY username",
        [],
        |r| {
            Ok(crate::models::User {
                id: r.get(0)?,
                username: r.get(1)?,
                role: r.get(2)?,
            })
        },
    )
}

fn teacher_from_row(r: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: r.get(0)?,
        user_id: r.get(1)?,
        name: r.get(2)?,
        nip: r.get(3)?,
    })
}

pub fn list_teachers(conn: &Connection) -> anyhow::Result<Vec<Teacher>> {
    collect(
        conn,
        "SELECT id, user_id, name, nip FROM teachers ORDER BY name",
        [],
        teacher_from_row,
    )
}

pub fn get_teacher(conn: &Connection, teacher_id: &str) -> anyhow::Result<Option<Teacher>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, name, nip FROM teachers WHERE id = ?",
            [teacher_id],
            teacher_from_row,
        )
        .optional()?)
}

pub fn get_teacher_by_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Teacher>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, name, nip FROM teachers WHERE user_id = ?",
            [user_id],
            teacher_from_row,
        )
        .optional()?)
}

fn class_from_row(r: &Row<'_>) -> rusqlite::Result<ClassData> {
    Ok(ClassData {
        id: r.get(0)?,
        name: r.get(1)?,
        teacher_id: r.get(2)?,
        fase: r.get(3)?,
    })
}

pub fn list_classes(conn: &Connection, teacher_id: Option<&str>) -> anyhow::Result<Vec<ClassData>> {
    match teacher_id {
        Some(t) => collect(
            conn,
            "SELECT id, name, teacher_id, fase FROM classes WHERE teacher_id = ? ORDER BY name",
            [t],
            class_from_row,
        ),
        None => collect(
            conn,
            "SELECT id, name, teacher_id, fase FROM classes ORDER BY name",
            [],
            class_from_row,
        ),
    }
}

pub fn get_class(conn: &Connection, class_id: &str) -> anyhow::Result<Option<ClassData>> {
    Ok(conn
        .query_row(
            "SELECT id, name, teacher_id, fase FROM classes WHERE id = ?",
            [class_id],
            class_from_row,
        )
        .optional()?)
}

pub fn list_students(conn: &Connection, class_id: Option<&str>) -> anyhow::Result<Vec<Student>> {
    match class_id {
        Some(c) => collect(
            conn,
            &format!(
                "SELECT {} FROM students WHERE class_id = ? ORDER BY name, id",
                STUDENT_COLS
            ),
            [c],
            student_from_row,
        ),
        None => collect(
            conn,
            &format!("SELECT {} FROM students ORDER BY name, id", STUDENT_COLS),
            [],
            student_from_row,
        ),
    }
}

pub fn get_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLS),
            [student_id],
            student_from_row,
        )
        .optional()?)
}

pub fn list_families(conn: &Connection, class_id: Option<&str>) -> anyhow::Result<Vec<StudentFamilyData>> {
    match class_id {
        Some(c) => collect(
            conn,
            &format!(
                "SELECT {} FROM student_family_data
                 WHERE student_id IN (SELECT id FROM students WHERE class_id = ?)",
                FAMILY_COLS
            ),
            [c],
            family_from_row,
        ),
        None => collect(
            conn,
            &format!("SELECT {} FROM student_family_data", FAMILY_COLS),
            [],
            family_from_row,
        ),
    }
}

pub fn get_family(conn: &Connection, student_id: &str) -> anyhow::Result<Option<StudentFamilyData>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM student_family_data WHERE student_id = ?",
                FAMILY_COLS
            ),
            [student_id],
            family_from_row,
        )
        .optional()?)
}

pub fn insert_student(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, nis, nisn, class_id, gender, birth_date, birth_place,
            religion, previous_education, student_address)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            student.id,
            student.name,
            student.nis,
            student.nisn,
            student.class_id,
            student.gender,
            student.birth_date,
            student.birth_place,
            student.religion,
            student.previous_education,
            student.student_address,
        ],
    )?;
    Ok(())
}

pub fn update_student(conn: &Connection, student: &Student) -> anyhow::Result<usize> {
    Ok(conn.execute(
        "UPDATE students SET name = ?, nis = ?, nisn = ?, class_id = ?, gender = ?,
            birth_date = ?, birth_place = ?, religion = ?, previous_education = ?,
            student_address = ?
         WHERE id = ?",
        rusqlite::params![
            student.name,
            student.nis,
            student.nisn,
            student.class_id,
            student.gender,
            student.birth_date,
            student.birth_place,
            student.religion,
            student.previous_education,
            student.student_address,
            student.id,
        ],
    )?)
}

pub fn upsert_family(conn: &Connection, family: &StudentFamilyData) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO student_family_data(student_id, father_name, father_job, mother_name,
            mother_job, parent_address, parent_phone, guardian_name, guardian_job,
            guardian_address, guardian_phone)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id) DO UPDATE SET
            father_name = excluded.father_name,
            father_job = excluded.father_job,
            mother_name = excluded.mother_name,
            mother_job = excluded.mother_job,
            parent_address = excluded.parent_address,
            parent_phone = excluded.parent_phone,
            guardian_name = excluded.guardian_name,
            guardian_job = excluded.guardian_job,
            guardian_address = excluded.guardian_address,
            guardian_phone = excluded.guardian_phone",
        rusqlite::params![
            family.student_id,
            family.father_name,
            family.father_job,
            family.mother_name,
            family.mother_job,
            serde_json::to_string(&family.parent_address)?,
            family.parent_phone,
            family.guardian_name,
            family.guardian_job,
            family.guardian_address,
            family.guardian_phone,
        ],
    )?;
    Ok(())
}

pub fn list_subjects(conn: &Connection) -> anyhow::Result<Vec<Subject>> {
    collect(
        conn,
        "SELECT id, name, category FROM subjects ORDER BY name",
        [],
        |r| {
            Ok(Subject {
                id: r.get(0)?,
                name: r.get(1)?,
                category: r.get(2)?,
            })
        },
    )
}

fn objective_from_row(r: &Row<'_>) -> rusqlite::Result<LearningObjective> {
    Ok(LearningObjective {
        id: r.get(0)?,
        code: r.get(1)?,
        description: r.get(2)?,
        subject_id: r.get(3)?,
        class_id: r.get(4)?,
    })
}

/// Objectives sorted by code, optionally narrowed to a subject and/or class.
pub fn list_learning_objectives(
    conn: &Connection,
    subject_id: Option<&str>,
    class_id: Option<&str>,
) -> anyhow::Result<Vec<LearningObjective>> {
    collect(
        conn,
        "SELECT id, code, description, subject_id, class_id
         FROM learning_objectives
         WHERE (?1 IS NULL OR subject_id = ?1) AND (?2 IS NULL OR class_id = ?2)
         ORDER BY code, id",
        (subject_id, class_id),
        objective_from_row,
    )
}

pub fn list_grade_predicates(conn: &Connection) -> anyhow::Result<Vec<GradePredicate>> {
    collect(
        conn,
        "SELECT id, threshold, description FROM grade_predicates ORDER BY threshold DESC, rowid",
        [],
        |r| {
            Ok(GradePredicate {
                id: r.get(0)?,
                threshold: r.get(1)?,
                description: r.get(2)?,
            })
        },
    )
}

pub fn list_extracurriculars(conn: &Connection) -> anyhow::Result<Vec<Extracurricular>> {
    collect(
        conn,
        "SELECT id, name FROM extracurriculars ORDER BY name",
        [],
        |r| {
            Ok(Extracurricular {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        },
    )
}

pub fn list_extracurricular_predicates(
    conn: &Connection,
    extracurricular_id: Option<&str>,
) -> anyhow::Result<Vec<ExtracurricularPredicate>> {
    collect(
        conn,
        "SELECT id, extracurricular_id, predicate, description
         FROM extracurricular_predicates
         WHERE (?1 IS NULL OR extracurricular_id = ?1)
         ORDER BY extracurricular_id, predicate, rowid",
        [extracurricular_id],
        |r| {
            Ok(ExtracurricularPredicate {
                id: r.get(0)?,
                extracurricular_id: r.get(1)?,
                predicate: r.get(2)?,
                description: r.get(3)?,
            })
        },
    )
}

pub fn list_grades(
    conn: &Connection,
    class_id: &str,
    subject_id: Option<&str>,
) -> anyhow::Result<Vec<StudentSubjectGrade>> {
    collect(
        conn,
        &format!(
            "SELECT {} FROM student_subject_grades
             WHERE class_id = ?1 AND (?2 IS NULL OR subject_id = ?2)
             ORDER BY rowid",
            GRADE_COLS
        ),
        (class_id, subject_id),
        grade_from_row,
    )
}

pub fn list_attendances(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<StudentAttendance>> {
    collect(
        conn,
        "SELECT student_id, present, permitted, unpermitted, teacher_note
         FROM student_attendances
         WHERE student_id IN (SELECT id FROM students WHERE class_id = ?)",
        [class_id],
        |r| {
            Ok(StudentAttendance {
                student_id: r.get(0)?,
                present: r.get(1)?,
                permitted: r.get(2)?,
                unpermitted: r.get(3)?,
                teacher_note: r.get(4)?,
            })
        },
    )
}

pub fn list_cocurriculars(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<StudentCoCurricular>> {
    collect(
        conn,
        "SELECT student_id, description
         FROM student_cocurriculars
         WHERE student_id IN (SELECT id FROM students WHERE class_id = ?)",
        [class_id],
        |r| {
            Ok(StudentCoCurricular {
                student_id: r.get(0)?,
                description: r.get(1)?,
            })
        },
    )
}

pub fn list_student_extracurriculars(
    conn: &Connection,
    class_id: &str,
) -> anyhow::Result<Vec<StudentExtracurricular>> {
    collect(
        conn,
        "SELECT se.id, se.student_id, se.extracurricular_id, se.predicate
         FROM student_extracurriculars se
         JOIN students s ON s.id = se.student_id
         WHERE s.class_id = ?
         ORDER BY se.rowid",
        [class_id],
        |r| {
            Ok(StudentExtracurricular {
                id: r.get(0)?,
                student_id: r.get(1)?,
                extracurricular_id: r.get(2)?,
                predicate: r.get(3)?,
            })
        },
    )
}

/// Everything a report run over one class reads, taken in one transaction.
#[derive(Debug, Clone, Default)]
pub struct ReportSnapshot {
    pub class: Option<ClassData>,
    pub homeroom_teacher: Option<Teacher>,
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub learning_objectives: Vec<LearningObjective>,
    pub grade_predicates: Vec<GradePredicate>,
    pub extracurriculars: Vec<Extracurricular>,
    pub extracurricular_predicates: Vec<ExtracurricularPredicate>,
    pub families: Vec<StudentFamilyData>,
    pub grades: Vec<StudentSubjectGrade>,
    pub attendances: Vec<StudentAttendance>,
    pub co_curriculars: Vec<StudentCoCurricular>,
    pub student_extracurriculars: Vec<StudentExtracurricular>,
}

impl ReportSnapshot {
    pub fn sources(&self) -> ReportSources<'_> {
        ReportSources {
            subjects: &self.subjects,
            learning_objectives: &self.learning_objectives,
            grade_predicates: &self.grade_predicates,
            extracurriculars: &self.extracurriculars,
            extracurricular_predicates: &self.extracurricular_predicates,
            families: &self.families,
            grades: &self.grades,
            attendances: &self.attendances,
            co_curriculars: &self.co_curriculars,
            student_extracurriculars: &self.student_extracurriculars,
        }
    }
}

pub fn load_report_snapshot(conn: &Connection, class_id: &str) -> anyhow::Result<ReportSnapshot> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin snapshot transaction")?;

    let class = get_class(&tx, class_id)?;
    let homeroom_teacher = match class.as_ref() {
        Some(c) if !c.teacher_id.is_empty() => get_teacher(&tx, &c.teacher_id)?,
        _ => None,
    };

    let snapshot = ReportSnapshot {
        class,
        homeroom_teacher,
        students: list_students(&tx, Some(class_id))?,
        subjects: list_subjects(&tx)?,
        learning_objectives: list_learning_objectives(&tx, None, Some(class_id))?,
        grade_predicates: list_grade_predicates(&tx)?,
        extracurriculars: list_extracurriculars(&tx)?,
        extracurricular_predicates: list_extracurricular_predicates(&tx, None)?,
        families: list_families(&tx, Some(class_id))?,
        grades: list_grades(&tx, class_id, None)?,
        attendances: list_attendances(&tx, class_id)?,
        co_curriculars: list_cocurriculars(&tx, class_id)?,
        student_extracurriculars: list_student_extracurriculars(&tx, class_id)?,
    };
    tx.commit().context("failed to end snapshot transaction")?;
    Ok(snapshot)
}
