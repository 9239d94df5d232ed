use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Messages,
    Chats,
    ChatParticipants,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Messages => "messages",
            Table::Chats => "chats",
            Table::ChatParticipants => "chat_participants",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// A row read against one table: equality filters, optional ordering and
/// an optional column projection.
#[derive(Debug, Clone)]
pub struct Query {
    pub table: Table,
    pub columns: Option<String>,
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Direction)>,
}

impl Query {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            columns: None,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some((column.to_string(), direction));
        self
    }

    /// Query-string pairs in the row service's filter syntax.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];

        for (column, value) in &self.filters {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => "null".to_string(),
                other => other.to_string(),
            };
            let op = if value.is_null() { "is" } else { "eq" };
            params.push((column.clone(), format!("{}.{}", op, rendered)));
        }

        if let Some((column, direction)) = &self.order {
            let dir = match direction {
                Direction::Ascending => "asc",
                Direction::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{}.{}", column, dir)));
        }

        params
    }

    /// Whether a row satisfies every equality filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }

    /// Keeps only the projected columns of a row.
    pub fn project(&self, row: &Value) -> Value {
        let Some(columns) = &self.columns else {
            return row.clone();
        };
        if columns.trim() == "*" {
            return row.clone();
        }

        let mut projected = serde_json::Map::new();
        for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if let Some(value) = row.get(column) {
                projected.insert(column.to_string(), value.clone());
            }
        }
        Value::Object(projected)
    }
}
