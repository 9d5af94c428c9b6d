//! Help composition.
//!
//! Anything that can answer a help query implements [`HelpNode`]: single
//! commands, module wrappers and the module group. Summaries from many nodes
//! are merged by [`compose_help_summary`], which buckets lines by category.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use mentionbot_core::{CommandSignal, PrivilegeLevel};

use super::CommandMeta;

/// One summary block tagged with its category (empty for uncategorized).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub category: String,
    pub summary: String,
}

#[async_trait]
pub trait HelpNode: Send + Sync {
    /// Detailed help.
    ///
    /// `locator` is what remains of the query after `entry`, the alias that
    /// led to this node.
    async fn help_detail(
        &self,
        locator: &str,
        entry: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal>;

    /// Summary lines; may span several lines.
    async fn help_summary(&self, privilege: PrivilegeLevel) -> String;

    fn node_min_priv(&self) -> PrivilegeLevel {
        PrivilegeLevel::lowest()
    }

    fn node_category(&self) -> String {
        String::new()
    }
}

#[async_trait]
impl HelpNode for CommandMeta {
    async fn help_detail(
        &self,
        _locator: &str,
        _entry: &str,
        privilege: PrivilegeLevel,
    ) -> Result<String, CommandSignal> {
        Ok(self.detail_text(privilege))
    }

    async fn help_summary(&self, _privilege: PrivilegeLevel) -> String {
        self.summary_text()
    }

    fn node_min_priv(&self) -> PrivilegeLevel {
        self.required_privilege()
    }

    fn node_category(&self) -> String {
        self.category_name().to_string()
    }
}

/// Merges summary blocks into one help message.
///
/// Lines are sorted case-insensitively inside each category. The
/// uncategorized block comes first, followed by one `**Category**` block per
/// category in case-insensitive order.
pub fn compose_help_summary<I>(entries: I) -> String
where
    I: IntoIterator<Item = HelpEntry>,
{
    let mut buckets: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
    for entry in entries {
        let lines = entry
            .summary
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string);
        buckets
            .entry(entry.category.to_lowercase())
            .or_insert_with(|| (entry.category.clone(), Vec::new()))
            .1
            .extend(lines);
    }

    let mut sections = Vec::new();
    // The empty category sorts first.
    for (key, (category, mut lines)) in buckets {
        if lines.is_empty() {
            continue;
        }
        lines.sort_by_key(|line| line.to_lowercase());
        let body = lines.join("\n");
        if key.is_empty() {
            sections.push(body);
        } else {
            sections.push(format!("**{category}**\n{body}"));
        }
    }
    sections.join("\n\n")
}

/// Collects summaries from `nodes`, skipping repeats of the same node.
pub async fn summarize_nodes(nodes: &[&dyn HelpNode], privilege: PrivilegeLevel) -> String {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for node in nodes {
        let addr = *node as *const dyn HelpNode as *const () as usize;
        if !seen.insert(addr) {
            continue;
        }
        entries.push(HelpEntry {
            category: node.node_category(),
            summary: node.help_summary(privilege).await,
        });
    }
    compose_help_summary(entries)
}
