use crate::db;
use crate::report::NarrativeTemplate;
use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const PROFILE_KEY: &str = "school.profile";

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Semester {
    #[default]
    Ganjil,
    Genap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchoolProfile {
    pub name: String,
    pub npsn: String,
    pub nss: String,
    pub principal_name: String,
    pub principal_nip: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    pub academic_year: String,
    pub semester: Semester,
    pub report_card_city: String,
    pub report_card_date: String,
    pub login_logo_url: String,
    pub report_cover_logo_url: String,
    pub report_prefix: String,
    pub report_highest_phrase: String,
    pub report_lowest_phrase: String,
}

impl Default for SchoolProfile {
    fn default() -> Self {
        Self {
            name: String::new(),
            npsn: String::new(),
            nss: String::new(),
            principal_name: String::new(),
            principal_nip: String::new(),
            address: String::new(),
            phone: String::new(),
            email: String::new(),
            academic_year: String::new(),
            semester: Semester::Ganjil,
            report_card_city: String::new(),
            report_card_date: String::new(),
            login_logo_url: String::new(),
            report_cover_logo_url: String::new(),
            report_prefix: "Ananda".to_string(),
            report_highest_phrase: "baik dalam".to_string(),
            report_lowest_phrase: "perlu peningkatan dalam".to_string(),
        }
    }
}

impl SchoolProfile {
    pub fn narrative(&self) -> NarrativeTemplate<'_> {
        NarrativeTemplate {
            prefix: &self.report_prefix,
            highest_phrase: &self.report_highest_phrase,
            lowest_phrase: &self.report_lowest_phrase,
        }
    }
}

/// Stored profile, or the default when absent or unreadable.
pub fn load(conn: &Connection) -> anyhow::Result<SchoolProfile> {
    let Some(raw) = db::settings_get_json(conn, PROFILE_KEY)? else {
        return Ok(SchoolProfile::default());
    };
    match serde_json::from_value::<SchoolProfile>(raw) {
        Ok(p) => Ok(p),
        Err(e) => {
            tracing::warn!(error = %e, "stored school profile unreadable, using defaults");
            Ok(SchoolProfile::default())
        }
    }
}

pub fn save(conn: &Connection, profile: &SchoolProfile) -> anyhow::Result<()> {
    db::settings_set_json(conn, PROFILE_KEY, &serde_json::to_value(profile)?)
}

/// `2024-06-22` -> `22 Juni 2024`. Anything that is not an ISO date is
/// returned as given.
pub fn format_indonesian_date(raw: &str) -> String {
    let t = raw.trim();
    match NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        Ok(d) => format!("{} {} {}", d.day(), MONTHS_ID[d.month0() as usize], d.year()),
        Err(_) => raw.to_string(),
    }
}
