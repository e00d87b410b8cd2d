use crate::db::{self, ReportSnapshot};
use crate::ipc::helpers::{
    db_conn, required_str, respond, to_value, DbResultExt, HandlerErr, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::models::Student;
use crate::profile::{self, format_indonesian_date};
use crate::report::{build_report, ExtracurricularLookup, ReportMode};
use serde_json::{json, Value};

const ALL_STUDENTS: &str = "all";

fn load_snapshot(state: &AppState, class_id: &str) -> Result<ReportSnapshot, HandlerErr> {
    let conn = db_conn(state)?;
    let snapshot = db::load_report_snapshot(conn, class_id).db_err("db_query_failed")?;
    if snapshot.class.is_none() {
        return Err(HandlerErr::not_found("class", class_id));
    }
    Ok(snapshot)
}

/// `"all"` selects the whole class in name order.
fn select_students<'a>(
    snapshot: &'a ReportSnapshot,
    student_id: &str,
) -> Result<Vec<&'a Student>, HandlerErr> {
    if student_id == ALL_STUDENTS {
        return Ok(snapshot.students.iter().collect());
    }
    snapshot
        .students
        .iter()
        .find(|s| s.id == student_id)
        .map(|s| vec![s])
        .ok_or_else(|| HandlerErr::not_found("student in class", student_id))
}

fn handle_report_card_model(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(&req.params, "classId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let mode_raw = required_str(&req.params, "mode")?;
    let mode = ReportMode::parse(&mode_raw).ok_or_else(|| {
        HandlerErr::bad_params("mode must be identity or grades")
            .with_details(json!({ "mode": mode_raw }))
    })?;

    let snapshot = load_snapshot(state, &class_id)?;
    let school = profile::load(db_conn(state)?).db_err("db_query_failed")?;
    let selected = select_students(&snapshot, &student_id)?;

    let sources = snapshot.sources();
    let lookup = ExtracurricularLookup::from_sources(&sources);
    let template = school.narrative();

    let mut records: Vec<Value> = Vec::with_capacity(selected.len());
    for student in &selected {
        let record = build_report(&sources, &lookup, &template, student, &class_id, mode);
        let mut v = to_value(&record)?;
        v["birthDateFormatted"] = json!(format_indonesian_date(&student.birth_date));
        records.push(v);
    }
    tracing::debug!(
        class_id = %class_id,
        students = records.len(),
        subjects = snapshot.subjects.len(),
        "report card model built"
    );

    let report_date = format_indonesian_date(&school.report_card_date);
    Ok(json!({
        "class": snapshot.class,
        "homeroomTeacher": snapshot.homeroom_teacher,
        "profile": school,
        "reportDate": report_date,
        "mode": mode,
        "records": records,
    }))
}

fn handle_cover_model(state: &mut AppState, req: &Request) -> HandlerResult {
    let class_id = required_str(&req.params, "classId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let snapshot = load_snapshot(state, &class_id)?;
    let school = profile::load(db_conn(state)?).db_err("db_query_failed")?;
    let students: Vec<Value> = select_students(&snapshot, &student_id)?
        .into_iter()
        .map(|s| json!({ "id": s.id, "name": s.name, "nis": s.nis, "nisn": s.nisn }))
        .collect();
    Ok(json!({
        "class": snapshot.class,
        "profile": school,
        "students": students,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.reportCardModel" => handle_report_card_model(state, req),
        "reports.coverModel" => handle_cover_model(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
