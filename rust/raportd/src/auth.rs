use crate::db;
use crate::models::{Role, User};
use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

/// Who is signed in, plus the rows the shell needs to scope its views.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub teacher_id: Option<String>,
    pub homeroom_class_ids: Vec<String>,
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn insert_user(conn: &Connection, username: &str, password: &str, role: Role) -> anyhow::Result<User> {
    let id = db::new_id();
    let salt = new_salt();
    conn.execute(
        "INSERT INTO users(id, username, password_salt, password_hash, role)
         VALUES(?, ?, ?, ?, ?)",
        (&id, username, &salt, digest(&salt, password), role),
    )?;
    Ok(User {
        id,
        username: username.to_string(),
        role,
    })
}

pub fn set_password(conn: &Connection, user_id: &str, password: &str) -> anyhow::Result<usize> {
    let salt = new_salt();
    Ok(conn.execute(
        "UPDATE users SET password_salt = ?, password_hash = ? WHERE id = ?",
        (&salt, digest(&salt, password), user_id),
    )?)
}

/// `None` for an unknown username or a wrong password; the two are not
/// distinguished.
pub fn verify(conn: &Connection, username: &str, password: &str) -> anyhow::Result<Option<User>> {
    let row: Option<(String, String, String, Role)> = conn
        .query_row(
            "SELECT id, password_salt, password_hash, role FROM users WHERE username = ?",
            [username],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((id, salt, hash, role)) = row else {
        return Ok(None);
    };
    if digest(&salt, password) != hash {
        return Ok(None);
    }
    Ok(Some(User {
        id,
        username: username.to_string(),
        role,
    }))
}

pub fn login(conn: &Connection, username: &str, password: &str) -> anyhow::Result<Option<Session>> {
    let Some(user) = verify(conn, username.trim(), password)? else {
        return Ok(None);
    };
    let teacher = db::get_teacher_by_user(conn, &user.id)?;
    let homeroom_class_ids = match teacher.as_ref() {
        Some(t) => db::list_classes(conn, Some(t.id.as_str()))?
            .into_iter()
            .map(|c| c.id)
            .collect(),
        None => Vec::new(),
    };
    Ok(Some(Session {
        user,
        teacher_id: teacher.map(|t| t.id),
        homeroom_class_ids,
    }))
}
