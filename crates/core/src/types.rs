use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// The eleven OParl object kinds this crate understands, independent of
/// which schema version (1.0 or 1.1) advertised the `type` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OParlType {
    System,
    Body,
    Organization,
    Person,
    Meeting,
    AgendaItem,
    Paper,
    Consultation,
    File,
    Location,
    Membership,
    LegislativeTerm,
}

impl OParlType {
    /// Resolve a `type` schema URL (either OParl 1.0 or 1.1 form) to its kind.
    /// Both versions publish the same path suffix, so matching on suffix
    /// covers both without maintaining two full URL tables.
    pub fn from_schema_url(url: &str) -> Option<Self> {
        let suffix = url.trim_end_matches('/').rsplit('/').next()?;
        let kind = match suffix {
            "System" => OParlType::System,
            "Body" => OParlType::Body,
            "Organization" => OParlType::Organization,
            "Person" => OParlType::Person,
            "Meeting" => OParlType::Meeting,
            "AgendaItem" => OParlType::AgendaItem,
            "Paper" => OParlType::Paper,
            "Consultation" => OParlType::Consultation,
            "File" => OParlType::File,
            "Location" => OParlType::Location,
            "Membership" => OParlType::Membership,
            "LegislativeTerm" => OParlType::LegislativeTerm,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OParlType::System => "system",
            OParlType::Body => "body",
            OParlType::Organization => "organization",
            OParlType::Person => "person",
            OParlType::Meeting => "meeting",
            OParlType::AgendaItem => "agenda_item",
            OParlType::Paper => "paper",
            OParlType::Consultation => "consultation",
            OParlType::File => "file",
            OParlType::Location => "location",
            OParlType::Membership => "membership",
            OParlType::LegislativeTerm => "legislative_term",
        }
    }
}

/// UUID5 namespace all entity ids are derived from. Arbitrary but fixed —
/// two processors computing `uuid5(URL_NAMESPACE, external_id)` must agree.
pub const URL_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x11, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

pub fn derive_uuid(external_id: &str) -> Uuid {
    Uuid::new_v5(&URL_NAMESPACE, external_id.as_bytes())
}

/// Common header shared by every entity: identity plus upstream timestamps.
#[derive(Debug, Clone)]
pub struct EntityHeader {
    pub id: Uuid,
    pub external_id: String,
    pub body_external_id: Option<String>,
    pub oparl_created: Option<DateTime<Utc>>,
    pub oparl_modified: Option<DateTime<Utc>>,
    pub raw_json: Value,
}

impl EntityHeader {
    pub fn new(external_id: String, raw_json: Value) -> Self {
        Self {
            id: derive_uuid(&external_id),
            external_id,
            body_external_id: None,
            oparl_created: None,
            oparl_modified: None,
            raw_json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub website: Option<String>,
    pub contact_email: Option<String>,
    pub contact_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Organization {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub organization_type: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Person {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Location {
    pub header: EntityHeader,
    pub description: Option<String>,
    pub street_address: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Meeting {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub cancelled: bool,
    pub location_external_id: Option<String>,
    pub location_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgendaItem {
    pub header: EntityHeader,
    pub meeting_external_id: Option<String>,
    pub name: Option<String>,
    pub order: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Paper {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub paper_type: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Consultation {
    pub header: EntityHeader,
    pub paper_external_id: Option<String>,
    pub meeting_external_id: Option<String>,
    pub agenda_item_external_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Membership {
    pub header: EntityHeader,
    pub person_external_id: Option<String>,
    pub organization_external_id: Option<String>,
    pub voting_right: bool,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LegislativeTerm {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Processing => "processing",
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Failed => "failed",
            ExtractionStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionMethod {
    PdfTextLayer,
    Ocr,
    Plaintext,
    Html,
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PdfTextLayer => "pdf-textlayer",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Plaintext => "plaintext",
            ExtractionMethod::Html => "html",
            ExtractionMethod::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct File {
    pub header: EntityHeader,
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<i64>,
    pub access_url: Option<String>,
    pub download_url: Option<String>,
    pub sha256_hash: Option<String>,
    pub text_content: Option<String>,
    pub extraction_status: ExtractionStatus,
    pub extraction_method: Option<ExtractionMethod>,
    pub extraction_error: Option<String>,
    pub page_count: Option<i32>,
    pub paper_external_id: Option<String>,
    pub meeting_external_id: Option<String>,
}

/// Every OParl entity kind flattened into one enum so the processor can
/// return a single nested-entity list regardless of what was discovered.
#[derive(Debug, Clone)]
pub enum Entity {
    Body(Box<Body>),
    Organization(Box<Organization>),
    Person(Box<Person>),
    Meeting(Box<Meeting>),
    AgendaItem(Box<AgendaItem>),
    Paper(Box<Paper>),
    Consultation(Box<Consultation>),
    File(Box<File>),
    Location(Box<Location>),
    Membership(Box<Membership>),
    LegislativeTerm(Box<LegislativeTerm>),
}

impl Entity {
    pub fn external_id(&self) -> &str {
        &self.header().external_id
    }

    pub fn header(&self) -> &EntityHeader {
        match self {
            Entity::Body(e) => &e.header,
            Entity::Organization(e) => &e.header,
            Entity::Person(e) => &e.header,
            Entity::Meeting(e) => &e.header,
            Entity::AgendaItem(e) => &e.header,
            Entity::Paper(e) => &e.header,
            Entity::Consultation(e) => &e.header,
            Entity::File(e) => &e.header,
            Entity::Location(e) => &e.header,
            Entity::Membership(e) => &e.header,
            Entity::LegislativeTerm(e) => &e.header,
        }
    }

    pub fn kind(&self) -> OParlType {
        match self {
            Entity::Body(_) => OParlType::Body,
            Entity::Organization(_) => OParlType::Organization,
            Entity::Person(_) => OParlType::Person,
            Entity::Meeting(_) => OParlType::Meeting,
            Entity::AgendaItem(_) => OParlType::AgendaItem,
            Entity::Paper(_) => OParlType::Paper,
            Entity::Consultation(_) => OParlType::Consultation,
            Entity::File(_) => OParlType::File,
            Entity::Location(_) => OParlType::Location,
            Entity::Membership(_) => OParlType::Membership,
            Entity::LegislativeTerm(_) => OParlType::LegislativeTerm,
        }
    }
}

/// Result of processing one raw OParl JSON object: the typed entity itself
/// (None when the payload's `type` was unrecognized), any entities embedded
/// inline in its fields (to be persisted as first-class rows), and a map of
/// field name to referenced external ids (resolved post-persistence).
#[derive(Debug, Clone, Default)]
pub struct ProcessedEntity {
    pub entity: Option<Entity>,
    /// Entities discovered inline, each paired with the references *it*
    /// carries — flattened recursively so a grandchild's references survive
    /// being folded into its grandparent's `nested` list.
    pub nested: Vec<(Entity, HashMap<String, Vec<String>>)>,
    pub references: HashMap<String, Vec<String>>,
}

/// The upstream list envelope: `{data:[...], links:{...}, pagination:{...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub links: ListLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListLinks {
    pub next: Option<String>,
}

/// A registered OParl endpoint — the unit the scheduler and `sync --all`
/// iterate over.
#[derive(Debug, Clone)]
pub struct OParlSource {
    pub id: Uuid,
    pub name: String,
    pub system_url: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub website: Option<String>,
    pub is_active: bool,
    pub priority: i16,
    pub category: String,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_full_sync: Option<DateTime<Utc>>,
    pub incremental_max_pages: Option<i32>,
}

impl OParlSource {
    pub fn new(name: impl Into<String>, system_url: impl Into<String>, priority: i16, category: impl Into<String>) -> Self {
        let system_url = system_url.into();
        Self {
            id: derive_uuid(&system_url),
            name: name.into(),
            system_url,
            contact_name: None,
            contact_email: None,
            website: None,
            is_active: true,
            priority,
            category: category.into(),
            last_sync: None,
            last_full_sync: None,
            incremental_max_pages: None,
        }
    }
}

/// Per-body-kind counters produced by a sync run, consumed by the CLI's
/// `sync`/`status` output and the scheduler's summary logging.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub source_url: String,
    pub success: bool,
    pub error: Option<String>,
    pub organizations_synced: u64,
    pub persons_synced: u64,
    pub memberships_synced: u64,
    pub meetings_synced: u64,
    pub papers_synced: u64,
    pub files_synced: u64,
    pub locations_synced: u64,
    pub agenda_items_synced: u64,
    pub consultations_synced: u64,
    pub legislative_terms_synced: u64,
    pub duration_secs: f64,
}

impl SyncResult {
    pub fn total_synced(&self) -> u64 {
        self.organizations_synced
            + self.persons_synced
            + self.memberships_synced
            + self.meetings_synced
            + self.papers_synced
            + self.files_synced
            + self.locations_synced
            + self.agenda_items_synced
            + self.consultations_synced
            + self.legislative_terms_synced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_url_resolves_both_oparl_versions() {
        assert_eq!(
            OParlType::from_schema_url("https://schema.oparl.org/1.0/Meeting"),
            Some(OParlType::Meeting)
        );
        assert_eq!(
            OParlType::from_schema_url("https://schema.oparl.org/1.1/Meeting"),
            Some(OParlType::Meeting)
        );
        assert_eq!(OParlType::from_schema_url("https://schema.oparl.org/1.1/Bogus"), None);
    }

    #[test]
    fn uuid_is_a_pure_function_of_external_id() {
        let a = derive_uuid("https://oparl.example.org/body/1");
        let b = derive_uuid("https://oparl.example.org/body/1");
        assert_eq!(a, b);
        let c = derive_uuid("https://oparl.example.org/body/2");
        assert_ne!(a, c);
    }
}
