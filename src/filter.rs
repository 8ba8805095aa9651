//! Filter predicates that narrow the working transaction set

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use crate::transaction::Transaction;

/// Binary order channel facet
pub const CHANNEL_FIELD: &str = "online_order";

const ONLINE_VALUES: [&str; 6] = ["true", "1", "1.0", "yes", "t", "y"];
const OFFLINE_VALUES: [&str; 6] = ["false", "0", "0.0", "no", "f", "n"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Online,
    Offline,
}

impl Channel {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim().to_lowercase();
        if ONLINE_VALUES.contains(&value.as_str()) {
            Some(Self::Online)
        } else if OFFLINE_VALUES.contains(&value.as_str()) {
            Some(Self::Offline)
        } else {
            None
        }
    }
}

/// A row predicate over a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Keep rows whose facet value is one of `values`
    Category { field: String, values: BTreeSet<String> },
    /// Keep rows whose numeric field is strictly greater than `threshold`
    Above { field: String, threshold: f64 },
    /// Online/offline inclusion flags for [`CHANNEL_FIELD`]
    Channel { include_online: bool, include_offline: bool },
    /// Keep rows matching every inner filter
    All(Vec<Filter>),
}

impl Filter {
    pub fn category<I, S>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Category {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn above(field: impl Into<String>, threshold: f64) -> Self {
        Self::Above {
            field: field.into(),
            threshold,
        }
    }

    pub fn channel(include_online: bool, include_offline: bool) -> Self {
        Self::Channel {
            include_online,
            include_offline,
        }
    }

    /// The single channel to keep, or `None` when both or neither flag is set
    fn selected_channel(include_online: bool, include_offline: bool) -> Option<Channel> {
        match (include_online, include_offline) {
            (true, false) => Some(Channel::Online),
            (false, true) => Some(Channel::Offline),
            _ => None,
        }
    }

    /// Whether this filter keeps every row
    pub fn is_noop(&self) -> bool {
        match self {
            Self::Channel {
                include_online,
                include_offline,
            } => Self::selected_channel(*include_online, *include_offline).is_none(),
            Self::All(filters) => filters.iter().all(Filter::is_noop),
            _ => false,
        }
    }

    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            Self::Category { field, values } => transaction
                .category(field)
                .is_some_and(|value| values.contains(value)),
            Self::Above { field, threshold } => transaction
                .numeric_field(field)
                .is_some_and(|value| value > *threshold),
            Self::Channel {
                include_online,
                include_offline,
            } => match Self::selected_channel(*include_online, *include_offline) {
                None => true,
                Some(wanted) => transaction
                    .category(CHANNEL_FIELD)
                    .and_then(Channel::parse)
                    .is_some_and(|channel| channel == wanted),
            },
            Self::All(filters) => filters.iter().all(|f| f.matches(transaction)),
        }
    }

    /// Keep the rows of `rows` matching this filter
    ///
    /// Selections outside the data's domain are not errors: they are logged
    /// and simply match nothing.
    pub fn apply<T: AsRef<Transaction> + Clone>(&self, rows: &[T]) -> Vec<T> {
        for problem in self.validate(rows) {
            warn!(filter = ?self, "{problem}");
        }

        let kept: Vec<T> = rows
            .iter()
            .filter(|row| self.matches(row.as_ref()))
            .cloned()
            .collect();
        debug!(before = rows.len(), after = kept.len(), "applied filter");
        kept
    }

    /// Describe selections that cannot match anything in `rows`
    pub fn validate<T: AsRef<Transaction>>(&self, rows: &[T]) -> Vec<String> {
        match self {
            Self::Category { field, values } => {
                let domain: HashSet<&str> = rows
                    .iter()
                    .filter_map(|row| row.as_ref().category(field))
                    .collect();
                if domain.is_empty() && !rows.is_empty() {
                    return vec![format!("unknown categorical field `{field}`")];
                }
                values
                    .iter()
                    .filter(|value| !domain.contains(value.as_str()))
                    .map(|value| format!("value `{value}` not present in field `{field}`"))
                    .collect()
            }
            Self::Above { field, .. } => {
                let known = rows
                    .iter()
                    .any(|row| row.as_ref().numeric_field(field).is_some());
                if known || rows.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("unknown numeric field `{field}`")]
                }
            }
            Self::Channel { .. } => Vec::new(),
            Self::All(filters) => filters.iter().flat_map(|f| f.validate(rows)).collect(),
        }
    }
}

/// Filters applied in sequence to the current working set
///
/// Each filter narrows the output of the previous one, so the result is the
/// intersection of all of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, filter: Filter) -> Self {
        self.push(filter);
        self
    }

    pub fn push(&mut self, filter: Filter) {
        if !filter.is_noop() {
            self.filters.push(filter);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn apply<T: AsRef<Transaction> + Clone>(&self, rows: &[T]) -> Vec<T> {
        let mut working = rows.to_vec();
        for filter in &self.filters {
            working = filter.apply(&working);
        }
        working
    }

    /// The whole set as a single conjunctive filter
    pub fn conjunction(&self) -> Filter {
        Filter::All(self.filters.clone())
    }
}
