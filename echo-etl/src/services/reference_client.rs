//! Bootstrap resolution of the identifiers a run depends on
//!
//! The program is configured by display names; the analytics queries need
//! ids. Everything here must succeed before retrieval starts, so every
//! failure is `EtlError::Bootstrap`.

use crate::error::{EtlError, EtlResult};
use crate::models::{OrgScope, Source};
use crate::services::analytics_client::AnalyticsClient;
use crate::services::target_expander::TargetOverrides;
use echo_common::config::ProgramConfig;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// `{id, displayName}` metadata reference
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRef {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

/// Identifiers resolved for one run
#[derive(Debug, Clone)]
pub struct ProgramRefs {
    pub org_scope: OrgScope,
    pub indicator_groups: Vec<Source>,
    pub data_element_groups: Vec<Source>,
    pub target_group: Source,
    pub target_overrides: TargetOverrides,
}

/// Metadata lookups against the same API as the analytics calls
pub struct ReferenceClient {
    client: Arc<AnalyticsClient>,
    program: ProgramConfig,
}

impl ReferenceClient {
    pub fn new(client: Arc<AnalyticsClient>, program: ProgramConfig) -> Self {
        Self { client, program }
    }

    pub async fn resolve(&self) -> EtlResult<ProgramRefs> {
        let org_groups = self.list("organisationUnitGroups").await?;
        let org_group = find_by_name(&org_groups, &self.program.org_unit_group, "organisation unit group")?;
        let org_scope = OrgScope::new(org_group.id.clone());

        let indicator_sets = self.list("indicatorGroupSets").await?;
        let mut indicator_groups = Vec::new();
        for set in filter_by_pattern(&indicator_sets, &self.program.indicator_group_set_pattern) {
            indicator_groups.extend(self.members("indicatorGroupSets", &set.id, "indicatorGroups").await?);
        }
        let indicator_groups: Vec<Source> = dedup_by_id(indicator_groups)
            .into_iter()
            .map(|g| Source::indicator_group(g.id, g.display_name))
            .collect();

        let element_sets = self.list("dataElementGroupSets").await?;
        let export_set = find_by_name(&element_sets, &self.program.data_element_group_set, "data element group set")?;
        let data_element_groups: Vec<Source> = dedup_by_id(
            self.members("dataElementGroupSets", &export_set.id, "dataElementGroups").await?,
        )
        .into_iter()
        .map(|g| Source::data_element_group(g.id, g.display_name))
        .collect();

        let element_groups = self.list("dataElementGroups").await?;
        let target = find_by_name(&element_groups, &self.program.target_data_element_group, "data element group")?;
        let target_group = Source::data_element_group(target.id.clone(), target.display_name.clone());

        let data_elements = self.list("dataElements").await?;
        let target_overrides = TargetOverrides::from_data_elements(
            data_elements.iter().map(|e| (e.id.as_str(), e.display_name.as_str())),
        );

        info!(
            org_unit_group = %org_scope.org_unit_group_id,
            indicator_groups = indicator_groups.len(),
            data_element_groups = data_element_groups.len(),
            target_group = %target_group.id,
            target_overrides = target_overrides.len(),
            "Program references resolved"
        );

        Ok(ProgramRefs {
            org_scope,
            indicator_groups,
            data_element_groups,
            target_group,
            target_overrides,
        })
    }

    /// `GET <collection>?paging=false&fields=id,displayName`
    async fn list(&self, collection: &str) -> EtlResult<Vec<NamedRef>> {
        let query = [
            ("paging", "false".to_string()),
            ("fields", "id,displayName".to_string()),
        ];
        let body = self
            .client
            .get_body(collection, &query)
            .await
            .map_err(|e| EtlError::Bootstrap(format!("{}: {}", collection, e)))?;
        parse_collection(&body, collection)
    }

    /// Members of one group set
    async fn members(&self, collection: &str, id: &str, key: &str) -> EtlResult<Vec<NamedRef>> {
        let endpoint = format!("{}/{}", collection, id);
        let query = [("fields", format!("{}[id,displayName]", key))];
        let body = self
            .client
            .get_body(&endpoint, &query)
            .await
            .map_err(|e| EtlError::Bootstrap(format!("{}: {}", endpoint, e)))?;
        parse_collection(&body, key)
    }
}

/// Extract `body[key]` as a list of references
pub fn parse_collection(body: &str, key: &str) -> EtlResult<Vec<NamedRef>> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| EtlError::Bootstrap(format!("{}: malformed JSON: {}", key, e)))?;
    let list = value
        .get(key)
        .cloned()
        .ok_or_else(|| EtlError::Bootstrap(format!("response has no `{}` list", key)))?;
    serde_json::from_value(list).map_err(|e| EtlError::Bootstrap(format!("{}: {}", key, e)))
}

/// Exact display-name match
pub fn find_by_name<'a>(refs: &'a [NamedRef], name: &str, what: &str) -> EtlResult<&'a NamedRef> {
    refs.iter()
        .find(|r| r.display_name == name)
        .ok_or_else(|| EtlError::Bootstrap(format!("{} `{}` not found", what, name)))
}

/// Case-insensitive substring match on display name
pub fn filter_by_pattern<'a>(refs: &'a [NamedRef], pattern: &str) -> Vec<&'a NamedRef> {
    let needle = pattern.to_lowercase();
    refs.iter()
        .filter(|r| r.display_name.to_lowercase().contains(&needle))
        .collect()
}

/// Drop repeated ids, keeping the first occurrence
fn dedup_by_id(refs: Vec<NamedRef>) -> Vec<NamedRef> {
    let mut seen = HashSet::new();
    refs.into_iter().filter(|r| seen.insert(r.id.clone())).collect()
}
