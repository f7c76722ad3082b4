use anyhow::Result;
use oparl_core::types::{
    AgendaItem, Body, Consultation, LegislativeTerm, Location, Meeting, Membership, Organization,
    Paper, Person,
};
use uuid::Uuid;

use crate::Storage;

/// Whether an upsert created a brand new row, refreshed an existing one, or
/// left it alone because the incoming `oparl_modified` was not newer than
/// what's already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Created)
    }

    pub fn action_label(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

pub(crate) fn outcome(row: Option<(bool,)>) -> UpsertOutcome {
    match row {
        Some((true,)) => UpsertOutcome::Created,
        Some((false,)) => UpsertOutcome::Updated,
        None => UpsertOutcome::Unchanged,
    }
}

impl Storage {
    pub async fn upsert_body(&self, body: &Body, source_id: Option<Uuid>) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_bodies
                (id, external_id, source_id, name, short_name, website, contact_email, contact_name,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (external_id) DO UPDATE SET
                source_id = EXCLUDED.source_id,
                name = EXCLUDED.name,
                short_name = EXCLUDED.short_name,
                website = EXCLUDED.website,
                contact_email = EXCLUDED.contact_email,
                contact_name = EXCLUDED.contact_name,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_bodies.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_bodies.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(body.header.id)
        .bind(&body.header.external_id)
        .bind(source_id)
        .bind(&body.name)
        .bind(&body.short_name)
        .bind(&body.website)
        .bind(&body.contact_email)
        .bind(&body.contact_name)
        .bind(body.header.oparl_created)
        .bind(body.header.oparl_modified)
        .bind(&body.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_organization(
        &self,
        org: &Organization,
        body_id: Option<Uuid>,
    ) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_organizations
                (id, external_id, body_id, name, short_name, organization_type, classification,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                name = EXCLUDED.name,
                short_name = EXCLUDED.short_name,
                organization_type = EXCLUDED.organization_type,
                classification = EXCLUDED.classification,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_organizations.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_organizations.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(org.header.id)
        .bind(&org.header.external_id)
        .bind(body_id)
        .bind(&org.name)
        .bind(&org.short_name)
        .bind(&org.organization_type)
        .bind(&org.classification)
        .bind(org.header.oparl_created)
        .bind(org.header.oparl_modified)
        .bind(&org.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_person(&self, person: &Person, body_id: Option<Uuid>) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_persons
                (id, external_id, body_id, name, given_name, family_name, title, email, phone,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                name = EXCLUDED.name,
                given_name = EXCLUDED.given_name,
                family_name = EXCLUDED.family_name,
                title = EXCLUDED.title,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_persons.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_persons.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(person.header.id)
        .bind(&person.header.external_id)
        .bind(body_id)
        .bind(&person.name)
        .bind(&person.given_name)
        .bind(&person.family_name)
        .bind(&person.title)
        .bind(&person.email)
        .bind(&person.phone)
        .bind(person.header.oparl_created)
        .bind(person.header.oparl_modified)
        .bind(&person.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_location(&self, loc: &Location, body_id: Option<Uuid>) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_locations
                (id, external_id, body_id, description, street_address, room,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                description = EXCLUDED.description,
                street_address = EXCLUDED.street_address,
                room = EXCLUDED.room,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_locations.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_locations.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(loc.header.id)
        .bind(&loc.header.external_id)
        .bind(body_id)
        .bind(&loc.description)
        .bind(&loc.street_address)
        .bind(&loc.room)
        .bind(loc.header.oparl_created)
        .bind(loc.header.oparl_modified)
        .bind(&loc.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_meeting(&self, meeting: &Meeting, body_id: Option<Uuid>) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_meetings
                (id, external_id, body_id, name, start, \"end\", cancelled,
                 location_external_id, location_name, oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                name = EXCLUDED.name,
                start = EXCLUDED.start,
                \"end\" = EXCLUDED.\"end\",
                cancelled = EXCLUDED.cancelled,
                location_external_id = EXCLUDED.location_external_id,
                location_name = EXCLUDED.location_name,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_meetings.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_meetings.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(meeting.header.id)
        .bind(&meeting.header.external_id)
        .bind(body_id)
        .bind(&meeting.name)
        .bind(meeting.start)
        .bind(meeting.end)
        .bind(meeting.cancelled)
        .bind(&meeting.location_external_id)
        .bind(&meeting.location_name)
        .bind(meeting.header.oparl_created)
        .bind(meeting.header.oparl_modified)
        .bind(&meeting.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_agenda_item(
        &self,
        item: &AgendaItem,
        meeting_id: Option<Uuid>,
    ) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_agenda_items
                (id, external_id, meeting_id, meeting_external_id, name, \"order\",
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (external_id) DO UPDATE SET
                meeting_id = EXCLUDED.meeting_id,
                meeting_external_id = EXCLUDED.meeting_external_id,
                name = EXCLUDED.name,
                \"order\" = EXCLUDED.\"order\",
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_agenda_items.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_agenda_items.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(item.header.id)
        .bind(&item.header.external_id)
        .bind(meeting_id)
        .bind(&item.meeting_external_id)
        .bind(&item.name)
        .bind(item.order)
        .bind(item.header.oparl_created)
        .bind(item.header.oparl_modified)
        .bind(&item.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_paper(&self, paper: &Paper, body_id: Option<Uuid>) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_papers
                (id, external_id, body_id, name, reference, paper_type, date,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                name = EXCLUDED.name,
                reference = EXCLUDED.reference,
                paper_type = EXCLUDED.paper_type,
                date = EXCLUDED.date,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_papers.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_papers.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(paper.header.id)
        .bind(&paper.header.external_id)
        .bind(body_id)
        .bind(&paper.name)
        .bind(&paper.reference)
        .bind(&paper.paper_type)
        .bind(paper.date.map(|d| d.date_naive()))
        .bind(paper.header.oparl_created)
        .bind(paper.header.oparl_modified)
        .bind(&paper.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_consultation(
        &self,
        consultation: &Consultation,
        paper_id: Option<Uuid>,
    ) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_consultations
                (id, external_id, paper_id, paper_external_id, meeting_external_id,
                 agenda_item_external_id, oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (external_id) DO UPDATE SET
                paper_id = EXCLUDED.paper_id,
                paper_external_id = EXCLUDED.paper_external_id,
                meeting_external_id = EXCLUDED.meeting_external_id,
                agenda_item_external_id = EXCLUDED.agenda_item_external_id,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_consultations.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_consultations.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(consultation.header.id)
        .bind(&consultation.header.external_id)
        .bind(paper_id)
        .bind(&consultation.paper_external_id)
        .bind(&consultation.meeting_external_id)
        .bind(&consultation.agenda_item_external_id)
        .bind(consultation.header.oparl_created)
        .bind(consultation.header.oparl_modified)
        .bind(&consultation.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_membership(
        &self,
        membership: &Membership,
        body_id: Option<Uuid>,
        person_id: Option<Uuid>,
        organization_id: Option<Uuid>,
    ) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_memberships
                (id, external_id, body_id, person_id, organization_id,
                 person_external_id, organization_external_id, role, voting_right,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                person_id = EXCLUDED.person_id,
                organization_id = EXCLUDED.organization_id,
                person_external_id = EXCLUDED.person_external_id,
                organization_external_id = EXCLUDED.organization_external_id,
                role = EXCLUDED.role,
                voting_right = EXCLUDED.voting_right,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_memberships.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_memberships.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(membership.header.id)
        .bind(&membership.header.external_id)
        .bind(body_id)
        .bind(person_id)
        .bind(organization_id)
        .bind(&membership.person_external_id)
        .bind(&membership.organization_external_id)
        .bind(&membership.role)
        .bind(membership.voting_right)
        .bind(membership.header.oparl_created)
        .bind(membership.header.oparl_modified)
        .bind(&membership.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }

    pub async fn upsert_legislative_term(
        &self,
        term: &LegislativeTerm,
        body_id: Option<Uuid>,
    ) -> Result<UpsertOutcome> {
        let row: Option<(bool,)> = sqlx::query_as(
            "INSERT INTO oparl_legislative_terms
                (id, external_id, body_id, name, start_date, end_date,
                 oparl_created, oparl_modified, raw_json)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (external_id) DO UPDATE SET
                body_id = EXCLUDED.body_id,
                name = EXCLUDED.name,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                oparl_created = EXCLUDED.oparl_created,
                oparl_modified = EXCLUDED.oparl_modified,
                raw_json = EXCLUDED.raw_json,
                updated_at = now()
             WHERE EXCLUDED.oparl_modified IS NULL OR oparl_legislative_terms.oparl_modified IS NULL
                OR EXCLUDED.oparl_modified >= oparl_legislative_terms.oparl_modified
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(term.header.id)
        .bind(&term.header.external_id)
        .bind(body_id)
        .bind(&term.name)
        .bind(term.start_date.map(|d| d.date_naive()))
        .bind(term.end_date.map(|d| d.date_naive()))
        .bind(term.header.oparl_created)
        .bind(term.header.oparl_modified)
        .bind(&term.header.raw_json)
        .fetch_optional(&self.pool)
        .await?;

        Ok(outcome(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xmax_true_means_created() {
        assert_eq!(outcome(Some((true,))), UpsertOutcome::Created);
    }

    #[test]
    fn xmax_false_means_updated() {
        assert_eq!(outcome(Some((false,))), UpsertOutcome::Updated);
    }

    #[test]
    fn no_row_means_unchanged() {
        assert_eq!(outcome(None), UpsertOutcome::Unchanged);
    }

    #[test]
    fn is_new_only_true_for_created() {
        assert!(UpsertOutcome::Created.is_new());
        assert!(!UpsertOutcome::Updated.is_new());
        assert!(!UpsertOutcome::Unchanged.is_new());
    }

    #[test]
    fn action_label_matches_variant() {
        assert_eq!(UpsertOutcome::Created.action_label(), "created");
        assert_eq!(UpsertOutcome::Updated.action_label(), "updated");
        assert_eq!(UpsertOutcome::Unchanged.action_label(), "unchanged");
    }
}
