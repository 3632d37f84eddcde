//! Channel query filters and sort orders.
//!
//! A `(QueryFilter, QuerySort)` pair identifies one channel-list query. Both
//! types are `Eq + Hash` so the pair can key a coordinator map directly.

use super::{Channel, UserId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Predicate over channels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryFilter {
    /// Matches every channel.
    All,
    /// Matches channels of the given type.
    ChannelType(String),
    /// Matches channels the given user is a member of.
    Member(UserId),
    /// Matches channels by frozen flag.
    Frozen(bool),
    /// Matches when every child matches. An empty `And` matches everything.
    And(Vec<QueryFilter>),
    /// Matches when any child matches. An empty `Or` matches nothing.
    Or(Vec<QueryFilter>),
}

impl QueryFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        match self {
            Self::All => true,
            Self::ChannelType(t) => channel.key.channel_type == *t,
            Self::Member(user_id) => channel.is_member(user_id),
            Self::Frozen(frozen) => channel.frozen == *frozen,
            Self::And(filters) => filters.iter().all(|f| f.matches(channel)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(channel)),
        }
    }
}

/// Field a channel list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    LastMessageAt,
    CreatedAt,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySort {
    pub specs: Vec<SortSpec>,
}

impl QuerySort {
    /// Sort by `field` ascending, appended after existing keys.
    pub fn asc(mut self, field: SortField) -> Self {
        self.specs.push(SortSpec {
            field,
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Sort by `field` descending, appended after existing keys.
    pub fn desc(mut self, field: SortField) -> Self {
        self.specs.push(SortSpec {
            field,
            direction: SortDirection::Descending,
        });
        self
    }

    /// Compare two channels. Ties on every key fall back to the cid so the
    /// order is total and stable across runs.
    pub fn compare(&self, a: &Channel, b: &Channel) -> Ordering {
        for spec in &self.specs {
            let ord = match spec.field {
                // Channels without messages sort as oldest.
                SortField::LastMessageAt => a.last_message_at.cmp(&b.last_message_at),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::Name => a.name.cmp(&b.name),
            };
            let ord = match spec.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.key.cmp(&b.key)
    }
}
