//! Closed allow-list of the tables the dynamic `/tables/:table` API serves.
//!
//! Identifiers in SQL text only ever come from this registry: path segments
//! resolve to a `TableKind`, body keys resolve to the registry's canonical
//! column names, and everything else is bound as a positional parameter.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Posts,
    Members,
    TradeRequests,
    Comments,
}

/// Columns the list search matches, where the table has them.
const SEARCH_COLUMNS: &[&str] = &["title", "content", "author"];

const POSTS_COLUMNS: &[&str] = &[
    "id",
    "board_type",
    "title",
    "content",
    "author",
    "item_name",
    "price",
    "views",
    "is_admin",
    "created_at",
    "updated_at",
    "deleted_at",
];

const MEMBERS_COLUMNS: &[&str] = &[
    "id",
    "username",
    "password_hash",
    "email",
    "status",
    "is_admin",
    "created_at",
    "updated_at",
    "deleted_at",
];

const TRADE_REQUESTS_COLUMNS: &[&str] = &[
    "id",
    "post_id",
    "post_title",
    "name",
    "id_number",
    "phone",
    "game_id",
    "sell_amount",
    "buy_amount",
    "status",
    "custom_date",
    "created_at",
    "updated_at",
    "deleted_at",
];

const COMMENTS_COLUMNS: &[&str] = &[
    "id",
    "post_id",
    "author",
    "content",
    "created_at",
    "updated_at",
    "deleted_at",
];

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Posts,
        TableKind::Members,
        TableKind::TradeRequests,
        TableKind::Comments,
    ];

    /// Resolves a URL path segment. Anything not named here never reaches SQL.
    pub fn from_path(segment: &str) -> Option<TableKind> {
        match segment {
            "posts" => Some(TableKind::Posts),
            "members" => Some(TableKind::Members),
            "trade_requests" => Some(TableKind::TradeRequests),
            "comments" => Some(TableKind::Comments),
            _ => None,
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            TableKind::Posts => "posts",
            TableKind::Members => "members",
            TableKind::TradeRequests => "trade_requests",
            TableKind::Comments => "comments",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            TableKind::Posts => POSTS_COLUMNS,
            TableKind::Members => MEMBERS_COLUMNS,
            TableKind::TradeRequests => TRADE_REQUESTS_COLUMNS,
            TableKind::Comments => COMMENTS_COLUMNS,
        }
    }

    /// Canonical identifier for a body-supplied column name, if the table has it.
    pub fn resolve_column(self, name: &str) -> Option<&'static str> {
        self.columns().iter().copied().find(|col| *col == name)
    }

    /// The subset of {title, content, author} this table actually has.
    pub fn search_columns(self) -> Vec<&'static str> {
        SEARCH_COLUMNS
            .iter()
            .copied()
            .filter(|col| self.resolve_column(col).is_some())
            .collect()
    }
}
