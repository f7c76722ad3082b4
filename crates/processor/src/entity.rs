use std::cell::RefCell;
use std::collections::HashMap;

use oparl_core::types::{
    AgendaItem, Body, Consultation, Entity, EntityHeader, ExtractionStatus, File, LegislativeTerm,
    Location, Meeting, Membership, OParlType, Organization, Paper, Person, ProcessedEntity,
};
use serde_json::Value;
use uuid::Uuid;

use crate::datetime::parse_datetime;
use crate::strings::{extract_id, extract_ref_ids, normalize_scalar_or_list, truncate_ellipsis};

/// Folds a nested `ProcessedEntity` into the parent's nested list, keeping
/// the child's own references attached so a grandchild's references survive
/// being flattened into its grandparent (see [`ProcessedEntity::nested`]).
fn push_processed(nested: &mut Vec<(Entity, HashMap<String, Vec<String>>)>, processed: ProcessedEntity) {
    if let Some(entity) = processed.entity {
        nested.push((entity, processed.references));
    }
    nested.extend(processed.nested);
}

/// The entity a nested File was scanned out of. Set directly on the File
/// before it's pushed onto the parent's nested list, since these files
/// never carry their own `paper`/`meeting` fields the way a standalone File
/// fetch payload does — only a standalone fetch's top-level object has
/// those; a `mainFile`/`invitation`/etc. sub-object embedded in a Meeting or
/// Paper has no such field to extract a reference from.
enum FileOwner<'a> {
    Meeting(&'a str),
    Paper(&'a str),
}

const FILE_FIELDS: [&str; 6] = [
    "mainFile",
    "auxiliaryFile",
    "invitation",
    "resultsProtocol",
    "verbatimProtocol",
    "derivativeFile",
];

/// Turns raw OParl JSON objects into typed entities plus their nested
/// entities and cross-references. One instance is scoped to a single body
/// sync so its UUID cache only needs to live as long as that run.
pub struct Processor {
    uuid_cache: RefCell<HashMap<String, Uuid>>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    pub fn new() -> Self {
        Self {
            uuid_cache: RefCell::new(HashMap::new()),
        }
    }

    fn uuid_for(&self, external_id: &str) -> Uuid {
        if let Some(id) = self.uuid_cache.borrow().get(external_id) {
            return *id;
        }
        let id = oparl_core::types::derive_uuid(external_id);
        self.uuid_cache.borrow_mut().insert(external_id.to_string(), id);
        id
    }

    fn header(&self, raw: &Value) -> Option<EntityHeader> {
        let external_id = raw.get("id")?.as_str()?.to_string();
        let mut header = EntityHeader::new(external_id.clone(), raw.clone());
        header.id = self.uuid_for(&external_id);
        header.body_external_id = raw.get("body").and_then(extract_id);
        header.oparl_created = raw.get("created").and_then(|v| v.as_str()).and_then(parse_datetime);
        header.oparl_modified = raw.get("modified").and_then(|v| v.as_str()).and_then(parse_datetime);
        Some(header)
    }

    /// Main entry point: resolve `type`, dispatch to the per-kind builder,
    /// and return the entity plus every nested entity/reference discovered
    /// while building it.
    pub fn process(&self, raw: &Value) -> ProcessedEntity {
        let Some(type_url) = raw.get("type").and_then(|v| v.as_str()) else {
            return ProcessedEntity::default();
        };
        let Some(kind) = OParlType::from_schema_url(type_url) else {
            tracing::warn!(type_url, "unknown OParl type");
            return ProcessedEntity::default();
        };

        match kind {
            OParlType::Body => self.process_body(raw),
            OParlType::Organization => self.process_organization(raw),
            OParlType::Person => self.process_person(raw),
            OParlType::Location => self.process_location(raw),
            OParlType::Meeting => self.process_meeting(raw),
            OParlType::AgendaItem => self.process_agenda_item(raw),
            OParlType::Paper => self.process_paper(raw),
            OParlType::Consultation => self.process_consultation(raw),
            OParlType::File => self.process_file(raw),
            OParlType::Membership => self.process_membership(raw),
            OParlType::LegislativeTerm => self.process_legislative_term(raw),
            OParlType::System => ProcessedEntity::default(),
        }
    }

    fn process_body(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };

        let mut references = HashMap::new();
        let list_fields = [
            ("organization", "organization"),
            ("person", "person"),
            ("meeting", "meeting"),
            ("paper", "paper"),
            ("membership", "membership"),
            ("locationList", "location"),
            ("agendaItem", "agenda_item"),
            ("legislativeTermList", "legislative_term"),
        ];
        for (field, key) in list_fields {
            if let Some(url) = raw.get(field).and_then(|v| v.as_str()) {
                references.insert(key.to_string(), vec![url.to_string()]);
            }
        }
        // consultation/consultations and file/files: prefer the singular form.
        for (preferred, fallback, key) in [
            ("consultation", "consultations", "consultation"),
            ("file", "files", "file"),
        ] {
            let url = raw
                .get(preferred)
                .and_then(|v| v.as_str())
                .or_else(|| raw.get(fallback).and_then(|v| v.as_str()));
            if let Some(url) = url {
                references.insert(key.to_string(), vec![url.to_string()]);
            }
        }

        let mut nested = Vec::new();
        if let Some(terms) = raw.get("legislativeTerm").and_then(|v| v.as_array()) {
            for term in terms {
                let processed = self.process_legislative_term(term);
                push_processed(&mut nested, processed);
            }
        }

        let body = Body {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            short_name: raw.get("shortName").and_then(|v| v.as_str()).map(String::from),
            website: raw.get("website").and_then(|v| v.as_str()).map(String::from),
            contact_email: raw.get("contactEmail").and_then(|v| v.as_str()).map(String::from),
            contact_name: raw.get("contactName").and_then(|v| v.as_str()).map(String::from),
        };

        ProcessedEntity {
            entity: Some(Entity::Body(Box::new(body))),
            nested,
            references,
        }
    }

    fn process_organization(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let org = Organization {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            short_name: raw.get("shortName").and_then(|v| v.as_str()).map(String::from),
            organization_type: raw.get("organizationType").and_then(|v| v.as_str()).map(String::from),
            classification: raw.get("classification").and_then(|v| v.as_str()).map(String::from),
        };
        ProcessedEntity {
            entity: Some(Entity::Organization(Box::new(org))),
            ..Default::default()
        }
    }

    fn process_person(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let person = Person {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            given_name: raw.get("givenName").and_then(|v| v.as_str()).map(String::from),
            family_name: raw.get("familyName").and_then(|v| v.as_str()).map(String::from),
            title: normalize_scalar_or_list(raw.get("title")),
            email: normalize_scalar_or_list(raw.get("email")),
            phone: normalize_scalar_or_list(raw.get("phone")),
        };
        ProcessedEntity {
            entity: Some(Entity::Person(Box::new(person))),
            ..Default::default()
        }
    }

    fn process_location(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let location = Location {
            header,
            description: raw.get("description").and_then(|v| v.as_str()).map(String::from),
            street_address: raw.get("streetAddress").and_then(|v| v.as_str()).map(String::from),
            room: raw.get("room").and_then(|v| v.as_str()).map(String::from),
        };
        ProcessedEntity {
            entity: Some(Entity::Location(Box::new(location))),
            ..Default::default()
        }
    }

    fn process_meeting(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let external_id = header.external_id.clone();

        let mut nested = Vec::new();
        let mut references: HashMap<String, Vec<String>> = HashMap::new();

        let (location_external_id, location_name) = match raw.get("location") {
            Some(Value::Object(_)) => {
                let loc_val = raw.get("location").unwrap();
                let processed = self.process_location(loc_val);
                let id = processed.entity.as_ref().map(|e| e.external_id().to_string());
                let name = loc_val
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .or_else(|| loc_val.get("room").and_then(|v| v.as_str()).map(String::from));
                push_processed(&mut nested, processed);
                (id, name)
            }
            Some(Value::String(s)) => (Some(s.clone()), None),
            _ => (None, None),
        };

        let orgs = extract_ref_ids(raw.get("organization"));
        if !orgs.is_empty() {
            references.insert("organization".to_string(), orgs);
        }

        if let Some(items) = raw.get("agendaItem").and_then(|v| v.as_array()) {
            for item in items {
                let mut processed = self.process_agenda_item(item);
                if let Some(Entity::AgendaItem(ai)) = &mut processed.entity {
                    ai.meeting_external_id = Some(external_id.clone());
                }
                push_processed(&mut nested, processed);
            }
        }

        let file_ids = self.scan_files(raw, FileOwner::Meeting(&external_id), &mut nested);
        if !file_ids.is_empty() {
            references.insert("files".to_string(), file_ids);
        }

        let meeting = Meeting {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            start: raw.get("start").and_then(|v| v.as_str()).and_then(parse_datetime),
            end: raw.get("end").and_then(|v| v.as_str()).and_then(parse_datetime),
            cancelled: raw.get("cancelled").and_then(|v| v.as_bool()).unwrap_or(false),
            location_external_id,
            location_name,
        };

        ProcessedEntity {
            entity: Some(Entity::Meeting(Box::new(meeting))),
            nested,
            references,
        }
    }

    fn process_agenda_item(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };

        let mut references = HashMap::new();
        if let Some(consultation) = raw.get("consultation") {
            if let Some(id) = extract_id(consultation) {
                references.insert("consultation".to_string(), vec![id]);
            }
        }

        // Only a plain string `meeting` field is taken directly; object form
        // is resolved by the parent Meeting's nested-recursion path instead.
        let meeting_external_id = raw.get("meeting").and_then(|v| v.as_str()).map(String::from);

        let item = AgendaItem {
            header,
            meeting_external_id,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            order: raw.get("order").and_then(|v| v.as_i64()).map(|n| n as i32),
        };

        ProcessedEntity {
            entity: Some(Entity::AgendaItem(Box::new(item))),
            references,
            ..Default::default()
        }
    }

    fn process_paper(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let external_id = header.external_id.clone();

        let mut nested = Vec::new();
        let mut references: HashMap<String, Vec<String>> = HashMap::new();

        for (field, key) in [
            ("originatorPerson", "originator_person"),
            ("originatorOrganization", "originator_organization"),
            ("underDirectionOf", "under_direction_of"),
        ] {
            let ids = extract_ref_ids(raw.get(field));
            if !ids.is_empty() {
                references.insert(key.to_string(), ids);
            }
        }

        if let Some(consultations) = raw.get("consultation").and_then(|v| v.as_array()) {
            for c in consultations {
                let mut processed = self.process_consultation(c);
                if let Some(Entity::Consultation(con)) = &mut processed.entity {
                    con.paper_external_id = Some(external_id.clone());
                }
                push_processed(&mut nested, processed);
            }
        }

        let file_ids = self.scan_files(raw, FileOwner::Paper(&external_id), &mut nested);
        if !file_ids.is_empty() {
            references.insert("files".to_string(), file_ids);
        }

        let paper = Paper {
            header,
            name: raw
                .get("name")
                .and_then(|v| v.as_str())
                .map(|s| truncate_ellipsis(s, 500)),
            reference: raw.get("reference").and_then(|v| v.as_str()).map(String::from),
            paper_type: raw.get("paperType").and_then(|v| v.as_str()).map(String::from),
            date: raw.get("date").and_then(|v| v.as_str()).and_then(parse_datetime),
        };

        ProcessedEntity {
            entity: Some(Entity::Paper(Box::new(paper))),
            nested,
            references,
        }
    }

    fn process_consultation(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };

        let scalar = |field: &str| raw.get(field).and_then(extract_id);

        let mut references = HashMap::new();
        let orgs = extract_ref_ids(raw.get("organization")).into_iter().chain(extract_ref_ids(raw.get("organizations"))).collect::<Vec<_>>();
        if !orgs.is_empty() {
            references.insert("organization".to_string(), orgs);
        }

        let consultation = Consultation {
            header,
            paper_external_id: scalar("paper"),
            meeting_external_id: scalar("meeting"),
            agenda_item_external_id: scalar("agendaItem"),
        };

        ProcessedEntity {
            entity: Some(Entity::Consultation(Box::new(consultation))),
            references,
            ..Default::default()
        }
    }

    fn process_file(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };

        let paper_external_ids = extract_ref_ids(raw.get("paper"));
        let meeting_external_ids = extract_ref_ids(raw.get("meeting"));

        let file = File {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(|s| truncate_ellipsis(s, 500)),
            file_name: raw.get("fileName").and_then(|v| v.as_str()).map(|s| truncate_ellipsis(s, 255)),
            mime_type: raw.get("mimeType").and_then(|v| v.as_str()).map(String::from),
            size: raw.get("size").and_then(|v| v.as_i64()),
            access_url: raw.get("accessUrl").and_then(|v| v.as_str()).map(String::from),
            download_url: raw.get("downloadUrl").and_then(|v| v.as_str()).map(String::from),
            sha256_hash: None,
            text_content: None,
            extraction_status: ExtractionStatus::Pending,
            extraction_method: None,
            extraction_error: None,
            page_count: None,
            paper_external_id: paper_external_ids.first().cloned(),
            meeting_external_id: meeting_external_ids.first().cloned(),
        };

        ProcessedEntity {
            entity: Some(Entity::File(Box::new(file))),
            ..Default::default()
        }
    }

    fn process_membership(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let scalar = |field: &str| raw.get(field).and_then(extract_id);
        let membership = Membership {
            header,
            person_external_id: scalar("person"),
            organization_external_id: scalar("organization"),
            voting_right: raw.get("votingRight").and_then(|v| v.as_bool()).unwrap_or(true),
            role: raw.get("role").and_then(|v| v.as_str()).map(String::from),
        };
        ProcessedEntity {
            entity: Some(Entity::Membership(Box::new(membership))),
            ..Default::default()
        }
    }

    fn process_legislative_term(&self, raw: &Value) -> ProcessedEntity {
        let Some(header) = self.header(raw) else {
            return ProcessedEntity::default();
        };
        let term = LegislativeTerm {
            header,
            name: raw.get("name").and_then(|v| v.as_str()).map(String::from),
            start_date: raw.get("startDate").and_then(|v| v.as_str()).and_then(parse_datetime),
            end_date: raw.get("endDate").and_then(|v| v.as_str()).and_then(parse_datetime),
        };
        ProcessedEntity {
            entity: Some(Entity::LegislativeTerm(Box::new(term))),
            ..Default::default()
        }
    }

    /// Scans the six file-carrying fields shared by Meeting and Paper.
    /// Object entries recurse through `process_file` and are pushed onto
    /// `nested`, with `owner` stamped onto the resulting File's
    /// `meeting_external_id`/`paper_external_id` — a nested file sub-object
    /// has no `meeting`/`paper` field of its own to extract that link from,
    /// unlike a standalone File fetch payload. String entries are recorded
    /// as references only.
    fn scan_files(&self, raw: &Value, owner: FileOwner<'_>, nested: &mut Vec<(Entity, HashMap<String, Vec<String>>)>) -> Vec<String> {
        let mut ids = Vec::new();
        for field in FILE_FIELDS {
            let Some(value) = raw.get(field) else { continue };
            let entries: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for entry in entries {
                match entry {
                    Value::Object(_) => {
                        let mut processed = self.process_file(entry);
                        if let Some(Entity::File(file)) = &mut processed.entity {
                            match owner {
                                FileOwner::Meeting(id) => file.meeting_external_id = Some(id.to_string()),
                                FileOwner::Paper(id) => file.paper_external_id = Some(id.to_string()),
                            }
                        }
                        if let Some(id) = processed.entity.as_ref().map(|e| e.external_id().to_string()) {
                            ids.push(id);
                        }
                        push_processed(nested, processed);
                    }
                    Value::String(s) => ids.push(s.clone()),
                    _ => {}
                }
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oparl_core::types::derive_uuid;
    use serde_json::json;

    fn processor() -> Processor {
        Processor::new()
    }

    #[test]
    fn unknown_type_yields_nothing() {
        let p = processor();
        let raw = json!({"id": "https://x/1", "type": "https://schema.oparl.org/1.1/Bogus"});
        let result = p.process(&raw);
        assert!(result.entity.is_none());
    }

    #[test]
    fn paper_name_truncates_at_500_with_ellipsis() {
        let p = processor();
        let long_name = "x".repeat(2000);
        let raw = json!({
            "id": "https://x/paper/1",
            "type": "https://schema.oparl.org/1.1/Paper",
            "name": long_name,
        });
        let result = p.process(&raw);
        let Some(Entity::Paper(paper)) = result.entity else { panic!("expected paper") };
        assert_eq!(paper.name.unwrap().chars().count(), 500);
    }

    #[test]
    fn meeting_with_nested_agenda_item_and_invitation() {
        let p = processor();
        let raw = json!({
            "id": "https://x/meeting/1",
            "type": "https://schema.oparl.org/1.1/Meeting",
            "name": "Ratssitzung",
            "agendaItem": [{"id": "https://x/ai/1", "type": "https://schema.oparl.org/1.1/AgendaItem", "order": 1, "name": "X"}],
            "invitation": {"id": "https://x/file/1", "type": "https://schema.oparl.org/1.1/File", "fileName": "i.pdf"},
        });
        let result = p.process(&raw);
        assert!(result.entity.is_some());
        assert_eq!(result.nested.len(), 2);
        let ai = result.nested.iter().find_map(|(e, _)| match e {
            Entity::AgendaItem(ai) => Some(ai),
            _ => None,
        }).unwrap();
        assert_eq!(ai.meeting_external_id.as_deref(), Some("https://x/meeting/1"));
        assert_eq!(result.references.get("files").unwrap(), &vec!["https://x/file/1".to_string()]);

        let file = result.nested.iter().find_map(|(e, _)| match e {
            Entity::File(f) => Some(f),
            _ => None,
        }).unwrap();
        assert_eq!(file.meeting_external_id.as_deref(), Some("https://x/meeting/1"));
        assert_eq!(file.paper_external_id, None);
    }

    #[test]
    fn nested_file_under_paper_links_to_paper_not_meeting() {
        let p = processor();
        let raw = json!({
            "id": "https://x/paper/3",
            "type": "https://schema.oparl.org/1.1/Paper",
            "mainFile": {"id": "https://x/file/2", "type": "https://schema.oparl.org/1.1/File", "fileName": "m.pdf"},
        });
        let result = p.process(&raw);
        let file = result.nested.iter().find_map(|(e, _)| match e {
            Entity::File(f) => Some(f),
            _ => None,
        }).unwrap();
        assert_eq!(file.paper_external_id.as_deref(), Some("https://x/paper/3"));
        assert_eq!(file.meeting_external_id, None);
    }

    #[test]
    fn nested_agenda_item_references_survive_flattening_into_meeting() {
        let p = processor();
        let raw = json!({
            "id": "https://x/meeting/2",
            "type": "https://schema.oparl.org/1.1/Meeting",
            "agendaItem": [{
                "id": "https://x/ai/2",
                "type": "https://schema.oparl.org/1.1/AgendaItem",
                "order": 1,
                "consultation": "https://x/consultation/1",
            }],
        });
        let result = p.process(&raw);
        let (_, ai_refs) = result.nested.iter().find(|(e, _)| matches!(e, Entity::AgendaItem(_))).unwrap();
        assert_eq!(ai_refs.get("consultation").unwrap(), &vec!["https://x/consultation/1".to_string()]);
    }

    #[test]
    fn uuid_is_stable_across_calls() {
        let p = processor();
        let raw = json!({"id": "https://x/org/1", "type": "https://schema.oparl.org/1.1/Organization"});
        let r1 = p.process(&raw);
        let r2 = p.process(&raw);
        assert_eq!(r1.entity.unwrap().header().id, r2.entity.unwrap().header().id);
        assert_eq!(r1_id(&raw), derive_uuid("https://x/org/1"));
    }

    fn r1_id(raw: &Value) -> Uuid {
        let p = processor();
        p.process(raw).entity.unwrap().header().id
    }

    #[test]
    fn person_title_list_normalizes_to_first_element() {
        let p = processor();
        let raw = json!({
            "id": "https://x/person/1",
            "type": "https://schema.oparl.org/1.1/Person",
            "title": ["Dr.", "Prof."],
            "email": [],
        });
        let result = p.process(&raw);
        let Some(Entity::Person(person)) = result.entity else { panic!("expected person") };
        assert_eq!(person.title.as_deref(), Some("Dr."));
        assert_eq!(person.email, None);
    }

    #[test]
    fn membership_voting_right_defaults_true() {
        let p = processor();
        let raw = json!({
            "id": "https://x/membership/1",
            "type": "https://schema.oparl.org/1.1/Membership",
            "person": "https://x/person/1",
            "organization": "https://x/org/1",
        });
        let result = p.process(&raw);
        let Some(Entity::Membership(m)) = result.entity else { panic!("expected membership") };
        assert!(m.voting_right);
    }
}
