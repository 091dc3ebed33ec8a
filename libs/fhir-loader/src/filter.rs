use ember_models::ResourceRecord;

/// Which extracted resources are kept for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Drop bundles of type `searchset`.
    pub exclude_search_bundles: bool,
    /// Keep only `document` bundles and `List` resources. Overrides every other rule.
    pub docs_and_lists_only: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            exclude_search_bundles: true,
            docs_and_lists_only: false,
        }
    }
}

impl FilterOptions {
    pub fn keeps(&self, record: &ResourceRecord) -> bool {
        if self.docs_and_lists_only {
            return record.is_document_bundle() || record.is_list();
        }
        !(self.exclude_search_bundles && record.is_search_bundle())
    }
}

/// Keep the records `options` admits, preserving their order.
pub fn apply(resources: Vec<ResourceRecord>, options: &FilterOptions) -> Vec<ResourceRecord> {
    let before = resources.len();
    let kept: Vec<_> = resources.into_iter().filter(|r| options.keeps(r)).collect();

    if kept.len() != before {
        tracing::debug!(
            count = kept.len(),
            dropped = before - kept.len(),
            "Filtered extracted resources"
        );
    }
    kept
}
