mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn teacher_lifecycle_with_login() {
    let workspace = temp_dir("raportd-teachers-auth");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "username": " admin ", "password": "admin" }),
    );
    assert_eq!(admin["user"]["role"], json!("admin"));
    assert_eq!(admin["teacherId"], json!(null));
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "3",
            "auth.login",
            json!({ "username": "admin", "password": "salah" })
        ),
        "auth_failed"
    );

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "4",
            "teachers.create",
            json!({ "name": "Pak Dedi", "nip": "", "username": "dedi", "password": "x" })
        ),
        "bad_params"
    );
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "teachers.create",
        json!({ "name": "Pak Dedi", "nip": "197903", "username": "dedi", "password": "guru123" }),
    );
    let teacher_id = str_field(&teacher, "/teacher/id");
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "6",
            "teachers.create",
            json!({ "name": "Dedi Lain", "nip": "1", "username": "dedi", "password": "y" })
        ),
        "conflict"
    );

    let class = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.create",
        json!({ "name": "Kelas 4", "teacherId": teacher_id }),
    );
    let class_id = str_field(&class, "/class/id");

    let session = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "auth.login",
        json!({ "username": "dedi", "password": "guru123" }),
    );
    assert_eq!(session["user"]["role"], json!("teacher"));
    assert_eq!(session["teacherId"], json!(teacher_id));
    assert_eq!(session["homeroomClassIds"], json!([class_id]));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "teachers.update",
        json!({ "teacherId": teacher_id, "name": "Pak Dedi S.", "nip": "197903", "username": "dedi.s", "password": "baru" }),
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "10",
            "auth.login",
            json!({ "username": "dedi", "password": "guru123" })
        ),
        "auth_failed"
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "auth.login",
        json!({ "username": "dedi.s", "password": "baru" }),
    );

    let mine = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "classes.list",
        json!({ "teacherId": teacher_id }),
    );
    assert_eq!(mine["classes"].as_array().map(|a| a.len()), Some(1));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "teachers.delete",
        json!({ "teacherId": teacher_id }),
    );
    let users = request_ok(&mut stdin, &mut reader, "14", "users.list", json!({}));
    assert_eq!(users["users"].as_array().map(|a| a.len()), Some(1));
    let classes = request_ok(&mut stdin, &mut reader, "15", "classes.list", json!({}));
    assert_eq!(classes["classes"][0]["teacherId"], json!(""));
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "16",
            "teachers.delete",
            json!({ "teacherId": teacher_id })
        ),
        "not_found"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
