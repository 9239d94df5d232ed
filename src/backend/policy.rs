//! Row-level access rules enforced by the in-process backend, one rule per
//! table and operation.

use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use super::query::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
}

/// Chat memberships as of the start of a request.
#[derive(Debug, Default, Clone)]
pub struct Memberships {
    pairs: HashSet<(Uuid, Uuid)>,
    chats: HashSet<Uuid>,
}

impl Memberships {
    pub fn from_rows(rows: &[Value]) -> Self {
        let mut memberships = Self::default();
        for row in rows {
            if let (Some(chat_id), Some(user_id)) = (uuid_field(row, "chat_id"), uuid_field(row, "user_id")) {
                memberships.pairs.insert((chat_id, user_id));
                memberships.chats.insert(chat_id);
            }
        }
        memberships
    }

    pub fn is_member(&self, chat_id: Uuid, user_id: Uuid) -> bool {
        self.pairs.contains(&(chat_id, user_id))
    }

    pub fn has_members(&self, chat_id: Uuid) -> bool {
        self.chats.contains(&chat_id)
    }
}

pub fn uuid_field(row: &Value, column: &str) -> Option<Uuid> {
    row.get(column)?.as_str()?.parse().ok()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn allows(
        &self,
        table: Table,
        operation: Operation,
        row: &Value,
        caller: Option<Uuid>,
        memberships: &Memberships,
    ) -> bool {
        let Some(caller) = caller else {
            return false;
        };

        match (table, operation) {
            (Table::Users, Operation::Select) => true,
            (Table::Users, _) => uuid_field(row, "id") == Some(caller),

            (Table::Chats, Operation::Insert) => true,
            (Table::Chats, _) => {
                uuid_field(row, "id").is_some_and(|chat| memberships.is_member(chat, caller))
            }

            // A chat without members is still being set up by its creator.
            (Table::ChatParticipants, Operation::Insert) => uuid_field(row, "chat_id")
                .is_some_and(|chat| {
                    !memberships.has_members(chat) || memberships.is_member(chat, caller)
                }),
            (Table::ChatParticipants, _) => uuid_field(row, "chat_id")
                .is_some_and(|chat| memberships.is_member(chat, caller)),

            (Table::Messages, Operation::Insert) => {
                uuid_field(row, "sender_id") == Some(caller)
                    && uuid_field(row, "chat_id")
                        .is_some_and(|chat| memberships.is_member(chat, caller))
            }
            (Table::Messages, _) => uuid_field(row, "chat_id")
                .is_some_and(|chat| memberships.is_member(chat, caller)),
        }
    }
}
