use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use oparl_core::types::{Meeting, Organization, Paper, Person};

const FILE_PREVIEW_MAX_CHARS: usize = 5_000;
const FILE_PREVIEW_TOTAL_MAX_CHARS: usize = 25_000;

#[derive(Debug, Clone, Serialize)]
pub struct PaperDocument {
    pub id: String,
    pub body_id: String,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub paper_type: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub file_contents_preview: String,
    pub file_names: Vec<String>,
    pub oparl_created: Option<DateTime<Utc>>,
    pub oparl_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingDocument {
    pub id: String,
    pub body_id: String,
    pub name: Option<String>,
    pub organization_names: Vec<String>,
    pub location_name: Option<String>,
    pub cancelled: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub oparl_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonDocument {
    pub id: String,
    pub body_id: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub title: Option<String>,
    pub oparl_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizationDocument {
    pub id: String,
    pub body_id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub organization_type: Option<String>,
    pub classification: Option<String>,
    pub oparl_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDocument {
    pub id: String,
    pub body_id: Option<String>,
    pub paper_id: Option<String>,
    pub meeting_id: Option<String>,
    pub text_content: Option<String>,
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub paper_name: Option<String>,
    pub paper_reference: Option<String>,
    pub oparl_modified: Option<DateTime<Utc>>,
}

/// Joins at most [`FILE_PREVIEW_MAX_CHARS`] per file and
/// [`FILE_PREVIEW_TOTAL_MAX_CHARS`] overall, so one paper with dozens of
/// attachments can't blow up the document size sent to the search backend.
pub fn build_file_preview<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    let mut preview = String::new();
    for text in texts {
        if preview.len() >= FILE_PREVIEW_TOTAL_MAX_CHARS {
            break;
        }
        let truncated: String = text.chars().take(FILE_PREVIEW_MAX_CHARS).collect();
        let remaining = FILE_PREVIEW_TOTAL_MAX_CHARS - preview.len();
        let piece: String = truncated.chars().take(remaining).collect();
        if !preview.is_empty() {
            preview.push('\n');
        }
        preview.push_str(&piece);
    }
    preview
}

pub fn build_paper_document(
    paper: &Paper,
    body_id: Uuid,
    file_texts: &[String],
    file_names: Vec<String>,
) -> PaperDocument {
    PaperDocument {
        id: paper.header.id.to_string(),
        body_id: body_id.to_string(),
        name: paper.name.clone(),
        reference: paper.reference.clone(),
        paper_type: paper.paper_type.clone(),
        date: paper.date,
        file_contents_preview: build_file_preview(file_texts.iter().map(String::as_str)),
        file_names,
        oparl_created: paper.header.oparl_created,
        oparl_modified: paper.header.oparl_modified,
    }
}

pub fn build_meeting_document(
    meeting: &Meeting,
    body_id: Uuid,
    organization_names: Vec<String>,
) -> MeetingDocument {
    MeetingDocument {
        id: meeting.header.id.to_string(),
        body_id: body_id.to_string(),
        name: meeting.name.clone(),
        organization_names,
        location_name: meeting.location_name.clone(),
        cancelled: meeting.cancelled,
        start: meeting.start,
        end: meeting.end,
        oparl_modified: meeting.header.oparl_modified,
    }
}

pub fn build_person_document(person: &Person, body_id: Uuid) -> PersonDocument {
    PersonDocument {
        id: person.header.id.to_string(),
        body_id: body_id.to_string(),
        name: person.name.clone(),
        given_name: person.given_name.clone(),
        family_name: person.family_name.clone(),
        title: person.title.clone(),
        oparl_modified: person.header.oparl_modified,
    }
}

pub fn build_organization_document(org: &Organization, body_id: Uuid) -> OrganizationDocument {
    OrganizationDocument {
        id: org.header.id.to_string(),
        body_id: body_id.to_string(),
        name: org.name.clone(),
        short_name: org.short_name.clone(),
        organization_type: org.organization_type.clone(),
        classification: org.classification.clone(),
        oparl_modified: org.header.oparl_modified,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn build_file_document(
    id: Uuid,
    body_id: Option<Uuid>,
    paper_id: Option<Uuid>,
    meeting_id: Option<Uuid>,
    text_content: Option<String>,
    name: Option<String>,
    file_name: Option<String>,
    mime_type: Option<String>,
    paper_name: Option<String>,
    paper_reference: Option<String>,
    oparl_modified: Option<DateTime<Utc>>,
) -> FileDocument {
    FileDocument {
        id: id.to_string(),
        body_id: body_id.map(|u| u.to_string()),
        paper_id: paper_id.map(|u| u.to_string()),
        meeting_id: meeting_id.map(|u| u.to_string()),
        text_content,
        name,
        file_name,
        mime_type,
        paper_name,
        paper_reference,
        oparl_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_each_file_and_the_total() {
        let long = "x".repeat(6_000);
        let texts = vec![long.clone(), long.clone(), long.clone(), long.clone(), long.clone(), long];
        let preview = build_file_preview(texts.iter().map(String::as_str));
        assert!(preview.len() <= FILE_PREVIEW_TOTAL_MAX_CHARS);
    }

    #[test]
    fn preview_of_no_files_is_empty() {
        let texts: Vec<String> = Vec::new();
        assert_eq!(build_file_preview(texts.iter().map(String::as_str)), "");
    }
}
