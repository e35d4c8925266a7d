//! Project records.
//!
//! Three column layouts exist on disk:
//!
//! | version | columns | notes                                              |
//! |---------|---------|----------------------------------------------------|
//! | 1       | 9       | description/deadline era, no category or location  |
//! | 2       | 11      | scheduling fields                                  |
//! | 3       | 18      | adds the service flags                             |
//!
//! Version 1 rows are upgraded on load: the deadline becomes the booking
//! date and the description is folded into the notes.

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::codec::{FieldKind, FieldSpec, Row, Schema, SchemaVersion, Value};
use crate::config::WorkspaceConfig;
use crate::customer::{Customer, CUSTOMER_SUBFOLDERS};
use crate::folders::FolderSpec;
use crate::record::{sanitize_component, KindSpec, Record, RecordId};

/// Status given to projects created through [`Project::new`].
pub const DEFAULT_STATUS: &str = "Aktiv";

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("ProjectId", FieldKind::Identity),
    FieldSpec::new("CustomerNumber", FieldKind::Integer),
    FieldSpec::new("ProjectName", FieldKind::Text),
    FieldSpec::new("Category", FieldKind::Text),
    FieldSpec::new("CreatedDate", FieldKind::Timestamp),
    FieldSpec::new("Booking", FieldKind::OptionalTimestamp),
    FieldSpec::new("Status", FieldKind::Text),
    FieldSpec::new("ProjectFolderPath", FieldKind::Text),
    FieldSpec::new("Notes", FieldKind::Text),
    FieldSpec::new("Location", FieldKind::Text),
    FieldSpec::new("BookingTime", FieldKind::TimeOfDay),
    FieldSpec::new("Fotografie", FieldKind::Bool),
    FieldSpec::new("Videografie", FieldKind::Bool),
    FieldSpec::new("Glueckwunschkarten", FieldKind::Bool),
    FieldSpec::new("GettingReady", FieldKind::Bool),
    FieldSpec::new("GettingReadyEr", FieldKind::Bool),
    FieldSpec::new("GettingReadySie", FieldKind::Bool),
    FieldSpec::new("GettingReadyBeide", FieldKind::Bool),
];

const LEGACY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("Description", FieldKind::Text),
    FieldSpec::new("Deadline", FieldKind::OptionalTimestamp),
];

const V1_COLUMNS: &[&str] = &[
    "ProjectId",
    "CustomerNumber",
    "ProjectName",
    "Description",
    "CreatedDate",
    "Deadline",
    "Status",
    "ProjectFolderPath",
    "Notes",
];

const V2_COLUMNS: &[&str] = &[
    "ProjectId",
    "CustomerNumber",
    "ProjectName",
    "Category",
    "CreatedDate",
    "Booking",
    "Status",
    "ProjectFolderPath",
    "Notes",
    "Location",
    "BookingTime",
];

const V3_COLUMNS: &[&str] = &[
    "ProjectId",
    "CustomerNumber",
    "ProjectName",
    "Category",
    "CreatedDate",
    "Booking",
    "Status",
    "ProjectFolderPath",
    "Notes",
    "Location",
    "BookingTime",
    "Fotografie",
    "Videografie",
    "Glueckwunschkarten",
    "GettingReady",
    "GettingReadyEr",
    "GettingReadySie",
    "GettingReadyBeide",
];

/// Subfolders of every project folder.
pub const PROJECT_SUBFOLDERS: &[&str] = &[
    "01_Fotos",
    "02_Videos",
    "03_Rohdaten",
    "04_Bearbeitet",
    "05_Export",
    "06_Dokumente",
    "07_Rechnungen",
    "08_Vertraege",
    "09_Notizen",
];

static KIND: KindSpec = KindSpec {
    name: "project",
    identity_floor: 1,
    schema: Schema {
        identity: "ProjectId",
        fields: FIELDS,
        legacy_fields: LEGACY_FIELDS,
        versions: &[
            SchemaVersion { version: 1, columns: V1_COLUMNS },
            SchemaVersion { version: 2, columns: V2_COLUMNS },
            SchemaVersion { version: 3, columns: V3_COLUMNS },
        ],
    },
    folders: FolderSpec {
        subfolders: PROJECT_SUBFOLDERS,
        info_file: "Projektinfo.txt",
    },
};

/// A booked job for one customer.
///
/// `customer_number` refers to a [`Customer`] but the store does not check
/// it; the two tables are independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: RecordId,
    pub customer_number: RecordId,
    pub project_name: String,
    pub category: String,
    pub created_date: NaiveDateTime,
    pub booking: Option<NaiveDateTime>,
    pub status: String,
    pub folder_path: String,
    pub notes: String,
    pub location: String,
    pub booking_time: NaiveTime,

    // Services
    pub photography: bool,
    pub videography: bool,
    pub greeting_cards: bool,
    pub getting_ready: bool,
    pub getting_ready_him: bool,
    pub getting_ready_her: bool,
    pub getting_ready_both: bool,
}

impl Project {
    /// Creates an unsaved project for a customer, stamped with the local time.
    #[must_use]
    pub fn new(customer_number: RecordId, project_name: impl Into<String>) -> Self {
        let now = Local::now().naive_local();
        Self {
            customer_number,
            project_name: project_name.into(),
            created_date: now.with_nanosecond(0).unwrap_or(now),
            status: DEFAULT_STATUS.to_string(),
            ..Self::default()
        }
    }

    /// `"<dd.MM.yyyy> <HH:mm> - <location>"` with placeholders for gaps.
    #[must_use]
    pub fn booking_info(&self) -> String {
        let date = self
            .booking
            .map_or_else(|| "Kein Datum".to_string(), |b| b.format("%d.%m.%Y").to_string());
        let location = if self.location.is_empty() {
            "Kein Ort"
        } else {
            self.location.as_str()
        };
        format!("{date} {} - {location}", self.booking_time.format("%H:%M"))
    }

    /// Who the getting-ready coverage is for, or `n/a`.
    #[must_use]
    pub fn getting_ready_summary(&self) -> String {
        if !self.getting_ready {
            return "n/a".to_string();
        }
        let parts: Vec<&str> = [
            (self.getting_ready_him, "Er"),
            (self.getting_ready_her, "Sie"),
            (self.getting_ready_both, "Beide"),
        ]
        .into_iter()
        .filter_map(|(on, label)| on.then_some(label))
        .collect();

        if parts.is_empty() {
            "n/a".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Folder name inside the customer's project directory.
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!(
            "P_{}_{}",
            self.project_id,
            sanitize_component(&self.project_name)
        )
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Ja"
    } else {
        "Nein"
    }
}

impl Record for Project {
    fn kind() -> &'static KindSpec {
        &KIND
    }

    fn id(&self) -> RecordId {
        self.project_id
    }

    fn set_id(&mut self, id: RecordId) {
        self.project_id = id;
    }

    fn folder_path(&self) -> &str {
        &self.folder_path
    }

    fn set_folder_path(&mut self, path: String) {
        self.folder_path = path;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Int(i64::from(self.project_id)),
            Value::Int(i64::from(self.customer_number)),
            Value::Text(self.project_name.clone()),
            Value::Text(self.category.clone()),
            Value::Timestamp(self.created_date),
            Value::OptionalTimestamp(self.booking),
            Value::Text(self.status.clone()),
            Value::Text(self.folder_path.clone()),
            Value::Text(self.notes.clone()),
            Value::Text(self.location.clone()),
            Value::Time(self.booking_time),
            Value::Bool(self.photography),
            Value::Bool(self.videography),
            Value::Bool(self.greeting_cards),
            Value::Bool(self.getting_ready),
            Value::Bool(self.getting_ready_him),
            Value::Bool(self.getting_ready_her),
            Value::Bool(self.getting_ready_both),
        ]
    }

    fn from_row(mut row: Row) -> Self {
        let mut notes = row.text("Notes");
        let description = row.text("Description");
        if !description.is_empty() {
            notes = if notes.is_empty() {
                description
            } else {
                format!("{description}\n{notes}")
            };
        }
        let booking = row
            .optional_timestamp("Booking")
            .or_else(|| row.optional_timestamp("Deadline"));

        Self {
            project_id: row.uint("ProjectId"),
            customer_number: row.uint("CustomerNumber"),
            project_name: row.text("ProjectName"),
            category: row.text("Category"),
            created_date: row.timestamp("CreatedDate"),
            booking,
            status: row.text("Status"),
            folder_path: row.text("ProjectFolderPath"),
            notes,
            location: row.text("Location"),
            booking_time: row.time("BookingTime"),
            photography: row.flag("Fotografie"),
            videography: row.flag("Videografie"),
            greeting_cards: row.flag("Glueckwunschkarten"),
            getting_ready: row.flag("GettingReady"),
            getting_ready_him: row.flag("GettingReadyEr"),
            getting_ready_her: row.flag("GettingReadySie"),
            getting_ready_both: row.flag("GettingReadyBeide"),
        }
    }

    fn canonical_folder(&self, config: &WorkspaceConfig) -> PathBuf {
        config
            .customers_path()
            .join(Customer::folder_name(self.customer_number))
            .join(CUSTOMER_SUBFOLDERS[0])
            .join(self.folder_name())
    }

    fn info_text(&self, created_at: NaiveDateTime) -> String {
        let booking = self
            .booking
            .map_or_else(|| "n/a".to_string(), |b| b.format("%d.%m.%Y").to_string());
        let location = if self.location.is_empty() {
            "n/a"
        } else {
            self.location.as_str()
        };

        format!(
            "PROJEKTINFORMATION\n\
             =================\n\
             Projekt-ID: {id}\n\
             Projektname: {name}\n\
             Kundennummer: {customer}\n\
             Kategorie: {category}\n\
             Status: {status}\n\
             Buchungsdatum: {booking}\n\
             Uhrzeit: {time}\n\
             Ort: {location}\n\
             Erstellt am: {created}\n\
             \n\
             DIENSTLEISTUNGEN:\n\
             Fotografie: {photo}\n\
             Videografie: {video}\n\
             Danksagungskarten: {cards}\n\
             Getting Ready: {ready}\n\
             Getting Ready für: {ready_for}\n\
             \n\
             ORDNERSTRUKTUR:\n\
             01_Fotos/        - Alle Fotos des Projekts\n\
             02_Videos/       - Alle Videos des Projekts\n\
             03_Rohdaten/     - Unbearbeitete Originaldateien\n\
             04_Bearbeitet/   - Bearbeitete Dateien\n\
             05_Export/       - Exportierte Dateien für Kunden\n\
             06_Dokumente/    - Projektbezogene Dokumente\n\
             07_Rechnungen/   - Rechnungen für dieses Projekt\n\
             08_Vertraege/    - Verträge für dieses Projekt\n\
             09_Notizen/      - Notizen und Planungen\n",
            id = self.project_id,
            name = self.project_name,
            customer = self.customer_number,
            category = self.category,
            status = self.status,
            time = self.booking_time.format("%H:%M"),
            created = created_at.format("%d.%m.%Y %H:%M"),
            photo = yes_no(self.photography),
            video = yes_no(self.videography),
            cards = yes_no(self.greeting_cards),
            ready = yes_no(self.getting_ready),
            ready_for = self.getting_ready_summary(),
        )
    }
}
