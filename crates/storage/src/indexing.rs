use anyhow::Result;
use chrono::{DateTime, Utc};
use oparl_core::types::{EntityHeader, Meeting, Organization, Paper, Person};
use serde_json::Value;
use uuid::Uuid;

use crate::files::FileRow;
use crate::Storage;

type PaperTuple = (Uuid, String, Option<String>, Option<String>, Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<DateTime<Utc>>, Value);
type OrgTuple = (Uuid, String, Option<String>, Option<String>, Option<String>, Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>, Value);
type PersonTuple = (Uuid, String, Option<String>, Option<String>, Option<String>, Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>, Value);
#[allow(clippy::type_complexity)]
type MeetingTuple = (
    Uuid,
    String,
    Option<String>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    bool,
    Option<String>,
    Option<String>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
    Value,
);

fn paper_from_tuple(t: PaperTuple) -> Paper {
    Paper {
        header: EntityHeader {
            id: t.0,
            external_id: t.1,
            body_external_id: None,
            oparl_created: t.6,
            oparl_modified: t.7,
            raw_json: t.8,
        },
        name: t.2,
        reference: t.3,
        paper_type: t.4,
        date: t.5,
    }
}

fn org_from_tuple(t: OrgTuple) -> Organization {
    Organization {
        header: EntityHeader {
            id: t.0,
            external_id: t.1,
            body_external_id: None,
            oparl_created: t.6,
            oparl_modified: t.7,
            raw_json: t.8,
        },
        name: t.2,
        short_name: t.3,
        organization_type: t.4,
        classification: t.5,
    }
}

fn person_from_tuple(t: PersonTuple) -> Person {
    Person {
        header: EntityHeader {
            id: t.0,
            external_id: t.1,
            body_external_id: None,
            oparl_created: t.6,
            oparl_modified: t.7,
            raw_json: t.8,
        },
        name: t.2,
        given_name: t.3,
        family_name: t.4,
        title: t.5,
        email: None,
        phone: None,
    }
}

fn meeting_from_tuple(t: MeetingTuple) -> Meeting {
    Meeting {
        header: EntityHeader {
            id: t.0,
            external_id: t.1,
            body_external_id: None,
            oparl_created: t.8,
            oparl_modified: t.9,
            raw_json: t.10,
        },
        name: t.2,
        start: t.3,
        end: t.4,
        cancelled: t.5,
        location_external_id: t.6,
        location_name: t.7,
    }
}

impl Storage {
    /// Papers plus their attached files' extracted text and file names, used
    /// to build search documents. Text previews are truncated by the search
    /// crate, not here — this returns the raw per-file text.
    pub async fn papers_for_indexing(&self, body_id: Uuid) -> Result<Vec<(Paper, Vec<String>, Vec<String>)>> {
        let rows: Vec<PaperTuple> = sqlx::query_as(
            "SELECT id, external_id, name, reference, paper_type, date, oparl_created, oparl_modified, raw_json
             FROM oparl_papers WHERE body_id = $1",
        )
        .bind(body_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let paper = paper_from_tuple(row);
            let files: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
                "SELECT text_content, file_name FROM oparl_files WHERE paper_id = $1",
            )
            .bind(paper.header.id)
            .fetch_all(&self.pool)
            .await?;
            let texts = files.iter().filter_map(|(t, _)| t.clone()).collect();
            let names = files.into_iter().filter_map(|(_, n)| n).collect();
            out.push((paper, texts, names));
        }
        Ok(out)
    }

    pub async fn organizations_for_indexing(&self, body_id: Uuid) -> Result<Vec<Organization>> {
        let rows: Vec<OrgTuple> = sqlx::query_as(
            "SELECT id, external_id, name, short_name, organization_type, classification,
                    oparl_created, oparl_modified, raw_json
             FROM oparl_organizations WHERE body_id = $1",
        )
        .bind(body_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(org_from_tuple).collect())
    }

    pub async fn persons_for_indexing(&self, body_id: Uuid) -> Result<Vec<Person>> {
        let rows: Vec<PersonTuple> = sqlx::query_as(
            "SELECT id, external_id, name, given_name, family_name, title,
                    oparl_created, oparl_modified, raw_json
             FROM oparl_persons WHERE body_id = $1",
        )
        .bind(body_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(person_from_tuple).collect())
    }

    /// Meetings plus the names of organizations referenced through
    /// `entity_references` (the plain `organization` field is a side-table
    /// link, not a foreign key column, since a meeting may list several).
    pub async fn meetings_for_indexing(&self, body_id: Uuid) -> Result<Vec<(Meeting, Vec<String>)>> {
        let rows: Vec<MeetingTuple> = sqlx::query_as(
            "SELECT id, external_id, name, start, \"end\", cancelled, location_external_id,
                    location_name, oparl_created, oparl_modified, raw_json
             FROM oparl_meetings WHERE body_id = $1",
        )
        .bind(body_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let meeting = meeting_from_tuple(row);
            let org_names: Vec<(String,)> = sqlx::query_as(
                "SELECT o.name FROM entity_references r
                 JOIN oparl_organizations o ON o.external_id = r.target_external_id
                 WHERE r.owner_external_id = $1 AND r.field_name = 'organization' AND o.name IS NOT NULL",
            )
            .bind(&meeting.header.external_id)
            .fetch_all(&self.pool)
            .await?;
            out.push((meeting, org_names.into_iter().map(|(n,)| n).collect()));
        }
        Ok(out)
    }

    pub async fn files_for_indexing(&self, body_id: Uuid) -> Result<Vec<FileRow>> {
        self.extraction_candidates_ignore_status(body_id).await
    }

    async fn extraction_candidates_ignore_status(&self, body_id: Uuid) -> Result<Vec<FileRow>> {
        let rows: Vec<(
            Uuid,
            String,
            Option<Uuid>,
            Option<Uuid>,
            Option<Uuid>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            String,
            Option<DateTime<Utc>>,
        )> = sqlx::query_as(
            "SELECT id, external_id, body_id, paper_id, meeting_id, name, file_name, mime_type,
                    download_url, text_content, extraction_status, oparl_modified
             FROM oparl_files WHERE body_id = $1",
        )
        .bind(body_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FileRow::from).collect())
    }
}
