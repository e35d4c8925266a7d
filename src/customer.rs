//! Customer records.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::codec::{FieldKind, FieldSpec, Row, Schema, SchemaVersion, Value};
use crate::config::WorkspaceConfig;
use crate::folders::FolderSpec;
use crate::record::{KindSpec, Record, RecordId};

const FIELDS: &[FieldSpec] = &[
    FieldSpec::new("CustomerNumber", FieldKind::Identity),
    FieldSpec::new("FirstName", FieldKind::Text),
    FieldSpec::new("LastName", FieldKind::Text),
    FieldSpec::new("Company", FieldKind::Text),
    FieldSpec::new("Email", FieldKind::Text),
    FieldSpec::new("Phone", FieldKind::Text),
    FieldSpec::new("Street", FieldKind::Text),
    FieldSpec::new("HouseNumber", FieldKind::Text),
    FieldSpec::new("ZipCode", FieldKind::Text),
    FieldSpec::new("City", FieldKind::Text),
    FieldSpec::new("VatId", FieldKind::Text),
    FieldSpec::new("FolderPath", FieldKind::Text),
];

const V1_COLUMNS: &[&str] = &[
    "CustomerNumber",
    "FirstName",
    "LastName",
    "Company",
    "Email",
    "Phone",
    "Street",
    "HouseNumber",
    "ZipCode",
    "City",
    "VatId",
];

const V2_COLUMNS: &[&str] = &[
    "CustomerNumber",
    "FirstName",
    "LastName",
    "Company",
    "Email",
    "Phone",
    "Street",
    "HouseNumber",
    "ZipCode",
    "City",
    "VatId",
    "FolderPath",
];

/// Subfolders of every customer folder. The first one holds project folders.
pub const CUSTOMER_SUBFOLDERS: &[&str] = &[
    "01_Projekte",
    "02_Vertraege",
    "03_Rechnungen",
    "04_Korrespondenz",
    "05_Medien",
    "06_Sonstiges",
    "07_Dokumente",
    "08_Angebote",
];

static KIND: KindSpec = KindSpec {
    name: "customer",
    identity_floor: 1000,
    schema: Schema {
        identity: "CustomerNumber",
        fields: FIELDS,
        legacy_fields: &[],
        versions: &[
            SchemaVersion { version: 1, columns: V1_COLUMNS },
            SchemaVersion { version: 2, columns: V2_COLUMNS },
        ],
    },
    folders: FolderSpec {
        subfolders: CUSTOMER_SUBFOLDERS,
        info_file: "Kundeninfo.txt",
    },
};

/// A studio customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_number: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub street: String,
    pub house_number: String,
    pub zip_code: String,
    pub city: String,
    pub vat_id: String,
    pub folder_path: String,
}

impl Customer {
    /// Creates an unsaved customer with just a name.
    #[must_use]
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    /// `"<number> - <first> <last> <company>"`, as shown in customer lists.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!(
            "{} - {} {} {}",
            self.customer_number, self.first_name, self.last_name, self.company
        )
        .trim_end()
        .to_string()
    }

    /// `"<street> <no>, <zip> <city>"`.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!(
            "{} {}, {} {}",
            self.street, self.house_number, self.zip_code, self.city
        )
    }

    /// Folder name under the customers directory.
    #[must_use]
    pub fn folder_name(customer_number: RecordId) -> String {
        format!("C_{customer_number}")
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "n/a"
    } else {
        value
    }
}

impl Record for Customer {
    fn kind() -> &'static KindSpec {
        &KIND
    }

    fn id(&self) -> RecordId {
        self.customer_number
    }

    fn set_id(&mut self, id: RecordId) {
        self.customer_number = id;
    }

    fn folder_path(&self) -> &str {
        &self.folder_path
    }

    fn set_folder_path(&mut self, path: String) {
        self.folder_path = path;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Int(i64::from(self.customer_number)),
            Value::Text(self.first_name.clone()),
            Value::Text(self.last_name.clone()),
            Value::Text(self.company.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.phone.clone()),
            Value::Text(self.street.clone()),
            Value::Text(self.house_number.clone()),
            Value::Text(self.zip_code.clone()),
            Value::Text(self.city.clone()),
            Value::Text(self.vat_id.clone()),
            Value::Text(self.folder_path.clone()),
        ]
    }

    fn from_row(mut row: Row) -> Self {
        Self {
            customer_number: row.uint("CustomerNumber"),
            first_name: row.text("FirstName"),
            last_name: row.text("LastName"),
            company: row.text("Company"),
            email: row.text("Email"),
            phone: row.text("Phone"),
            street: row.text("Street"),
            house_number: row.text("HouseNumber"),
            zip_code: row.text("ZipCode"),
            city: row.text("City"),
            vat_id: row.text("VatId"),
            folder_path: row.text("FolderPath"),
        }
    }

    fn canonical_folder(&self, config: &WorkspaceConfig) -> PathBuf {
        config
            .customers_path()
            .join(Self::folder_name(self.customer_number))
    }

    fn info_text(&self, created_at: NaiveDateTime) -> String {
        format!(
            "KUNDENINFORMATION\n\
             ================\n\
             Kundennummer: {number}\n\
             Name: {first} {last}\n\
             Firma: {company}\n\
             E-Mail: {email}\n\
             Telefon: {phone}\n\
             Adresse: {address}\n\
             USt-ID: {vat}\n\
             Erstellt am: {created}\n\
             \n\
             ORDNERSTRUKTUR:\n\
             01_Projekte/     - Alle Projektordner\n\
             02_Vertraege/    - Verträge und Vereinbarungen\n\
             03_Rechnungen/   - Rechnungen (Eingang/Ausgang)\n\
             04_Korrespondenz/- E-Mails, Briefe, Kommunikation\n\
             05_Medien/       - Fotos, Videos, Grafiken\n\
             06_Sonstiges/    - Diverse Dateien\n\
             07_Dokumente/    - Wichtige Dokumente\n\
             08_Angebote/     - Angebote und Kostenvoranschläge\n",
            number = self.customer_number,
            first = self.first_name,
            last = self.last_name,
            company = or_na(&self.company),
            email = self.email,
            phone = self.phone,
            address = self.full_address(),
            vat = or_na(&self.vat_id),
            created = created_at.format("%d.%m.%Y %H:%M"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_line, encode_line, header};
    use crate::error::DecodeError;

    fn sample() -> Customer {
        Customer {
            customer_number: 1000,
            first_name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            company: "Lopez, Bild & Ton".to_string(),
            email: "ana@example.com".to_string(),
            phone: "+49 30 1234".to_string(),
            street: "Hauptstraße".to_string(),
            house_number: "5a".to_string(),
            zip_code: "10115".to_string(),
            city: "Berlin".to_string(),
            vat_id: String::new(),
            folder_path: "/ws/Customers/C_1000".to_string(),
        }
    }

    #[test]
    fn test_header() {
        assert_eq!(
            header::<Customer>(),
            "CustomerNumber,FirstName,LastName,Company,Email,Phone,Street,HouseNumber,ZipCode,City,VatId,FolderPath"
        );
    }

    #[test]
    fn test_encode_quotes_company_with_comma() {
        let line = encode_line(&sample()).unwrap();
        assert!(line.starts_with("1000,Ana,Lopez,\"Lopez, Bild & Ton\","));
        assert!(line.ends_with(",,/ws/Customers/C_1000"));
    }

    #[test]
    fn test_roundtrip() {
        let customer = sample();
        let line = encode_line(&customer).unwrap();
        assert_eq!(decode_line::<Customer>(&line).unwrap(), customer);
    }

    #[test]
    fn test_encode_requires_identity() {
        let err = encode_line(&Customer::new("Ana", "Lopez")).unwrap_err();
        assert!(format!("{err}").contains("no identity"));
    }

    #[test]
    fn test_decode_legacy_without_folder_path() {
        let line = "1001,Ben,Meyer,,ben@example.com,,,,,,DE123";
        let customer = decode_line::<Customer>(line).unwrap();
        assert_eq!(customer.customer_number, 1001);
        assert_eq!(customer.vat_id, "DE123");
        assert_eq!(customer.folder_path, "");
    }

    #[test]
    fn test_decode_too_few_columns() {
        let err = decode_line::<Customer>("1002,Ben,Meyer").unwrap_err();
        assert_eq!(err, DecodeError::TooFewColumns { found: 3, required: 11 });
    }

    #[test]
    fn test_canonical_folder() {
        let config = WorkspaceConfig::new("/ws");
        assert_eq!(
            sample().canonical_folder(&config),
            PathBuf::from("/ws/Customers/C_1000")
        );
    }

    #[test]
    fn test_display_helpers() {
        let c = sample();
        assert_eq!(c.display_name(), "1000 - Ana Lopez Lopez, Bild & Ton");
        assert_eq!(c.full_address(), "Hauptstraße 5a, 10115 Berlin");
        assert_eq!(Customer::new("A", "B").display_name(), "0 - A B");
    }

    #[test]
    fn test_info_text() {
        let created = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        let text = sample().info_text(created);
        assert!(text.starts_with("KUNDENINFORMATION\n"));
        assert!(text.contains("Kundennummer: 1000\n"));
        assert!(text.contains("USt-ID: n/a\n"));
        assert!(text.contains("Erstellt am: 01.03.2024 09:05\n"));
        assert!(text.contains("08_Angebote/"));
    }
}
