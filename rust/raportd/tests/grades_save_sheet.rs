mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn grades_save_upserts_on_student_subject_class_and_clamps() {
    let workspace = temp_dir("raportd-grades-save");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "Kelas 2" }));
    let class_id = str_field(&class, "/class/id");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({ "name": "Matematika", "category": "Wajib" }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "student": { "name": "Siti Aminah", "classId": class_id, "gender": "P" } }),
    );
    let student_id = str_field(&student, "/student/id");

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.save",
        json!({ "grades": [{
            "id": "new-abc",
            "studentId": student_id,
            "subjectId": "subject-1",
            "classId": class_id,
            "tpGrades": { "lo-b": 130, "lo-a": -2 },
            "summativeGrades": [null, 60],
            "finalExamScore": null
        }]}),
    );
    let saved_id = str_field(&first, "/grades/0/id");
    assert!(!saved_id.starts_with("new-"));
    assert_eq!(first["grades"][0]["tpGrades"], json!({ "lo-b": 100, "lo-a": 0 }));

    // Same triple with a fresh placeholder id lands on the existing row.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.save",
        json!({ "grades": [{
            "id": "new-def",
            "studentId": student_id,
            "subjectId": "subject-1",
            "classId": class_id,
            "tpGrades": { "lo-a": 70, "lo-b": 80 },
            "finalExamScore": 90
        }]}),
    );
    assert_eq!(str_field(&second, "/grades/0/id"), saved_id);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grades.list",
        json!({ "classId": class_id, "subjectId": "subject-1" }),
    );
    let grades = listed["grades"].as_array().expect("grades");
    assert_eq!(grades.len(), 1);
    let keys: Vec<&String> = grades[0]["tpGrades"]
        .as_object()
        .expect("tpGrades")
        .keys()
        .collect();
    assert_eq!(keys, vec!["lo-a", "lo-b"]);
    assert_eq!(grades[0]["finalExamScore"], json!(90));

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "8",
            "grades.save",
            json!({ "grades": [{
                "studentId": student_id,
                "subjectId": "subject-1",
                "classId": class_id,
                "tpGrades": { "lo-a": "delapan puluh" }
            }]})
        ),
        "bad_params"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "9",
            "grades.save",
            json!({ "grades": [{
                "studentId": student_id,
                "subjectId": "subject-99",
                "classId": class_id
            }]})
        ),
        "not_found"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn grade_sheet_pads_rows_and_uses_not_graded_note() {
    let workspace = temp_dir("raportd-grades-sheet");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "Kelas 3" }));
    let class_id = str_field(&class, "/class/id");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "subjects.create",
        json!({ "name": "IPAS", "category": "Wajib" }),
    );
    let lo2 = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "objectives.create",
        json!({ "code": "TP2", "description": "Siklus air", "subjectId": "subject-1", "classId": class_id }),
    );
    let lo1 = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "objectives.create",
        json!({ "code": "TP1", "description": "Bagian tumbuhan", "subjectId": "subject-1", "classId": class_id }),
    );
    let lo1 = str_field(&lo1, "/objective/id");
    let lo2 = str_field(&lo2, "/objective/id");

    let mut student_ids = Vec::new();
    for (i, name) in ["Bunga Lestari", "Adi Saputra"].iter().enumerate() {
        let s = request_ok(
            &mut stdin,
            &mut reader,
            &format!("st{}", i),
            "students.create",
            json!({ "student": { "name": name, "classId": class_id } }),
        );
        student_ids.push(str_field(&s, "/student/id"));
    }
    let bunga = &student_ids[0];

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.save",
        json!({ "grades": [{
            "studentId": bunga,
            "subjectId": "subject-1",
            "classId": class_id,
            "tpGrades": { (lo2.clone()): 88 },
            "summativeGrades": [80, 82, 84]
        }]}),
    );

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "grades.sheet",
        json!({ "classId": class_id, "subjectId": "subject-1" }),
    );
    let codes: Vec<&str> = sheet["objectives"]
        .as_array()
        .expect("objectives")
        .iter()
        .filter_map(|o| o["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["TP1", "TP2"]);
    assert_eq!(sheet["summativeColumns"], json!(3));

    let rows = sheet["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["studentName"], json!("Adi Saputra"));
    assert_eq!(
        str_field(&rows[0], "/grade/id"),
        format!("new-{}-subject-1", student_ids[1])
    );
    assert_eq!(rows[0]["grade"]["summativeGrades"], json!([null, null, null]));
    assert_eq!(rows[0]["grade"]["tpGrades"][&lo1], json!(null));
    assert_eq!(rows[0]["finalScore"], json!(0));
    assert_eq!(rows[0]["predicate"], json!("-"));
    assert_eq!(rows[0]["highestDescription"], json!("Belum ada nilai TP yang diisi."));

    assert_eq!(rows[1]["studentName"], json!("Bunga Lestari"));
    assert_eq!(rows[1]["highestDescription"], json!("Siklus air"));
    assert_eq!(rows[1]["lowestDescription"], json!("Siklus air"));
    assert_eq!(rows[1]["finalScore"], json!(85));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
