mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn report_card_model_assembles_grades_and_narrative() {
    let workspace = temp_dir("raportd-report-card");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "profile.update",
        json!({ "profile": {
            "name": "SDN PULASAREN 4",
            "reportCardCity": "Cirebon",
            "reportCardDate": "2024-06-22",
            "semester": "Genap"
        }}),
    );
    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "teachers.create",
        json!({ "name": "Ibu Ratna", "nip": "198001012005012001", "username": "ratna", "password": "rahasia" }),
    );
    let teacher_id = str_field(&teacher, "/teacher/id");
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "name": "Kelas 1", "teacherId": teacher_id, "fase": "A" }),
    );
    let class_id = str_field(&class, "/class/id");

    let mut subject_ids = Vec::new();
    for (i, (name, category)) in [
        ("Pendidikan Pancasila", "Wajib"),
        ("Matematika", "Wajib"),
        ("Seni Musik", "Pilihan"),
        ("Bahasa Cirebon", "Mulok"),
    ]
    .iter()
    .enumerate()
    {
        let s = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "subjects.create",
            json!({ "name": name, "category": category }),
        );
        subject_ids.push(str_field(&s, "/subject/id"));
    }
    assert_eq!(subject_ids, vec!["subject-1", "subject-2", "subject-3", "subject-4"]);

    let lo1 = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "objectives.create",
        json!({ "code": "TP1", "description": "Mengenal bilangan", "subjectId": "subject-2", "classId": class_id }),
    );
    let lo2 = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "objectives.create",
        json!({ "code": "TP2", "description": "Penjumlahan", "subjectId": "subject-2", "classId": class_id }),
    );
    let lo1 = str_field(&lo1, "/objective/id");
    let lo2 = str_field(&lo2, "/objective/id");

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.create",
        json!({
            "student": { "name": "Adi Saputra", "nis": "1001", "classId": class_id, "gender": "L", "birthDate": "2017-05-01" },
            "family": { "fatherName": "Budi", "parentAddress": { "city": "Cirebon" } }
        }),
    );
    let student_id = str_field(&student, "/student/id");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grades.save",
        json!({ "grades": [
            {
                "id": "new-1",
                "studentId": student_id,
                "subjectId": "subject-2",
                "classId": class_id,
                "tpGrades": { (lo1.clone()): 95, (lo2.clone()): 75 },
                "summativeGrades": [85, null],
                "finalExamScore": 85
            },
            {
                "studentId": student_id,
                "subjectId": "subject-1",
                "classId": class_id,
                "tpGrades": {},
                "summativeGrades": [100, 100],
                "finalExamScore": 100
            },
            {
                "studentId": student_id,
                "subjectId": "subject-3",
                "classId": class_id,
                "finalExamScore": 70
            }
        ]}),
    );

    let extra = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "extracurriculars.create",
        json!({ "name": "Pramuka" }),
    );
    let extra_id = str_field(&extra, "/extracurricular/id");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "extracurricularPredicates.create",
        json!({ "extracurricularId": extra_id, "predicate": "A", "description": "Sangat aktif" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "studentExtracurriculars.save",
        json!({ "entries": [{ "studentId": student_id, "extracurricularId": extra_id, "predicate": "A" }] }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.save",
        json!({ "records": [{ "studentId": student_id, "present": 110, "permitted": 2, "unpermitted": 0, "teacherNote": "Pertahankan prestasimu" }] }),
    );

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "reports.reportCardModel",
        json!({ "classId": class_id, "studentId": "all", "mode": "grades" }),
    );
    assert_eq!(model["reportDate"], json!("22 Juni 2024"));
    assert_eq!(model["homeroomTeacher"]["name"], json!("Ibu Ratna"));
    assert_eq!(model["profile"]["reportPrefix"], json!("Ananda"));

    let records = model["records"].as_array().expect("records");
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r["birthDateFormatted"], json!("1 Mei 2017"));
    assert_eq!(r["teacherNote"], json!("Pertahankan prestasimu"));
    assert_eq!(r["familyData"]["parentAddress"]["city"], json!("Cirebon"));

    let wajib = r["gradesByCategory"]["wajib"].as_array().expect("wajib");
    let wajib_ids: Vec<&str> = wajib
        .iter()
        .filter_map(|l| l["subject"]["id"].as_str())
        .collect();
    assert_eq!(wajib_ids, vec!["subject-1", "subject-2"]);
    assert_eq!(wajib[0]["finalScore"], json!(100));
    assert_eq!(wajib[0]["predicate"], json!("Sangat Baik"));
    assert_eq!(
        wajib[0]["description"],
        json!("Ananda Adi baik dalam -. perlu peningkatan dalam -.")
    );
    assert_eq!(wajib[1]["finalScore"], json!(85));
    assert_eq!(wajib[1]["predicate"], json!("Baik"));
    assert_eq!(
        wajib[1]["description"],
        json!("Ananda Adi baik dalam Mengenal bilangan. perlu peningkatan dalam Penjumlahan.")
    );

    let pilihan = r["gradesByCategory"]["pilihan"].as_array().expect("pilihan");
    assert_eq!(pilihan.len(), 1);
    assert_eq!(pilihan[0]["predicate"], json!("Cukup"));
    assert_eq!(r["gradesByCategory"]["mulok"], json!([]));

    let extras = r["extracurricularEntries"].as_array().expect("extras");
    assert_eq!(extras[0]["name"], json!("Pramuka"));
    assert_eq!(extras[0]["description"], json!("Sangat aktif"));

    // Deleting the activity cascades its student rows away.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "extracurriculars.delete",
        json!({ "extracurricularId": extra_id }),
    );
    let single = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "reports.reportCardModel",
        json!({ "classId": class_id, "studentId": student_id, "mode": "identity" }),
    );
    assert_eq!(single["records"][0]["mode"], json!("identity"));
    assert_eq!(single["records"][0]["extracurricularEntries"], json!([]));

    let cover = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "reports.coverModel",
        json!({ "classId": class_id, "studentId": "all" }),
    );
    assert_eq!(cover["students"][0]["nis"], json!("1001"));
    assert_eq!(cover["profile"]["name"], json!("SDN PULASAREN 4"));

    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "17",
            "reports.reportCardModel",
            json!({ "classId": class_id, "studentId": "someone-else", "mode": "grades" })
        ),
        "not_found"
    );
    assert_eq!(
        request_err(
            &mut stdin,
            &mut reader,
            "18",
            "reports.reportCardModel",
            json!({ "classId": class_id, "studentId": "all", "mode": "landscape" })
        ),
        "bad_params"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
