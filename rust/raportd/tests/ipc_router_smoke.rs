mod test_support;

use serde_json::json;
use std::io::Write;
use test_support::{read_line, request, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("raportd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    assert_eq!(
        request_err(&mut stdin, &mut reader, "2", "classes.list", json!({})),
        "no_workspace"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("raport.sqlite3").is_file());

    let methods = [
        ("users.list", json!({})),
        ("teachers.list", json!({})),
        ("classes.list", json!({})),
        ("students.list", json!({})),
        ("subjects.list", json!({})),
        ("objectives.list", json!({})),
        ("predicates.list", json!({})),
        ("extracurriculars.list", json!({})),
        ("extracurricularPredicates.list", json!({})),
        ("grades.list", json!({ "classId": "none" })),
        ("attendance.list", json!({ "classId": "none" })),
        ("cocurricular.list", json!({ "classId": "none" })),
        ("studentExtracurriculars.list", json!({ "classId": "none" })),
        ("profile.get", json!({})),
    ];
    for (i, (method, params)) in methods.iter().enumerate() {
        let id = format!("m{}", i);
        let _ = request_ok(&mut stdin, &mut reader, &id, method, params.clone());
    }

    let predicates = request_ok(&mut stdin, &mut reader, "4", "predicates.list", json!({}));
    let descriptions: Vec<&str> = predicates["predicates"]
        .as_array()
        .expect("predicates")
        .iter()
        .filter_map(|p| p["description"].as_str())
        .collect();
    assert_eq!(descriptions, vec!["Sangat Baik", "Baik", "Cukup", "Perlu Bimbingan"]);

    let unknown = request(&mut stdin, &mut reader, "5", "nope.method", json!({}));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "6",
            "reports.reportCardModel",
            json!({ "classId": "missing", "studentId": "all", "mode": "grades" })
        ),
        "not_found"
    );

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let bad = read_line(&mut reader);
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad["error"]["code"], json!("bad_json"));

    // Still serving after a bad line.
    let _ = request_ok(&mut stdin, &mut reader, "7", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn reopening_a_workspace_does_not_reseed() {
    let workspace = temp_dir("raportd-reopen");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let select = json!({ "path": workspace.to_string_lossy() });

    let _ = request_ok(&mut stdin, &mut reader, "1", "workspace.select", select.clone());
    let list = request_ok(&mut stdin, &mut reader, "2", "predicates.list", json!({}));
    let last_id = list["predicates"][3]["id"].as_str().expect("id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "predicates.delete",
        json!({ "predicateId": last_id }),
    );

    let _ = request_ok(&mut stdin, &mut reader, "4", "workspace.select", select);
    let list = request_ok(&mut stdin, &mut reader, "5", "predicates.list", json!({}));
    assert_eq!(list["predicates"].as_array().map(|a| a.len()), Some(3));
    let users = request_ok(&mut stdin, &mut reader, "6", "users.list", json!({}));
    assert_eq!(users["users"].as_array().map(|a| a.len()), Some(1));
    assert!(users["users"][0].get("passwordHash").is_none());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
