/// Fixed ranking-rule order applied to every index. Meilisearch's own
/// default order, kept explicit so a backend upgrade can't silently change it.
pub const RANKING_RULES: &[&str] =
    &["words", "typo", "proximity", "attribute", "sort", "exactness"];

pub struct IndexSettingsSpec {
    pub name: &'static str,
    pub searchable: &'static [&'static str],
    pub filterable: &'static [&'static str],
    pub sortable: &'static [&'static str],
}

pub const INDEX_SETTINGS: &[IndexSettingsSpec] = &[
    IndexSettingsSpec {
        name: "papers",
        searchable: &["name", "reference", "paper_type", "file_contents_preview", "file_names"],
        filterable: &["body_id", "paper_type", "date"],
        sortable: &["date", "oparl_created", "oparl_modified"],
    },
    IndexSettingsSpec {
        name: "meetings",
        searchable: &["name", "organization_names", "location_name"],
        filterable: &["body_id", "cancelled", "start"],
        sortable: &["start", "end", "oparl_modified"],
    },
    IndexSettingsSpec {
        name: "persons",
        searchable: &["name", "given_name", "family_name", "title"],
        filterable: &["body_id"],
        sortable: &["family_name", "given_name", "oparl_modified"],
    },
    IndexSettingsSpec {
        name: "organizations",
        searchable: &["name", "short_name", "organization_type", "classification"],
        filterable: &["body_id", "organization_type"],
        sortable: &["name", "oparl_modified"],
    },
    IndexSettingsSpec {
        name: "files",
        searchable: &["text_content", "name", "file_name", "paper_name", "paper_reference"],
        filterable: &["body_id", "paper_id", "meeting_id", "mime_type"],
        sortable: &["oparl_modified"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_indices_are_configured() {
        assert_eq!(INDEX_SETTINGS.len(), 5);
    }

    #[test]
    fn ranking_rules_match_fixed_order() {
        assert_eq!(RANKING_RULES.len(), 6);
        assert_eq!(RANKING_RULES[0], "words");
        assert_eq!(RANKING_RULES[5], "exactness");
    }
}
