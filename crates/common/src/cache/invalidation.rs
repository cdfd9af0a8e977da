//! Which cached reads a successful write makes obsolete

use super::{keys, KeyPrefix};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    TicketReply,
    TicketStatusChange,
    KnowledgeDocumentChange,
}

/// A write that completed successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    TicketReply { ticket_id: String },
    TicketStatusChange { ticket_id: String },
    KnowledgeDocumentChange,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::TicketReply { .. } => MutationKind::TicketReply,
            Mutation::TicketStatusChange { .. } => MutationKind::TicketStatusChange,
            Mutation::KnowledgeDocumentChange => MutationKind::KnowledgeDocumentChange,
        }
    }

    /// Entity the write touched, if any
    pub fn entity(&self) -> Option<&str> {
        match self {
            Mutation::TicketReply { ticket_id } | Mutation::TicketStatusChange { ticket_id } => {
                Some(ticket_id)
            }
            Mutation::KnowledgeDocumentChange => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    resource: &'static str,
    per_entity: bool,
}

/// Explicit mutation → key prefix table
#[derive(Debug, Clone)]
pub struct InvalidationMap {
    targets: HashMap<MutationKind, Vec<Target>>,
}

impl InvalidationMap {
    pub fn empty() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }

    /// Invalidate `resource` after `kind`. With `per_entity` only the keys
    /// scoped to the mutated entity are dropped.
    pub fn on(mut self, kind: MutationKind, resource: &'static str, per_entity: bool) -> Self {
        self.targets
            .entry(kind)
            .or_default()
            .push(Target {
                resource,
                per_entity,
            });
        self
    }

    pub fn prefixes(&self, mutation: &Mutation) -> Vec<KeyPrefix> {
        let Some(targets) = self.targets.get(&mutation.kind()) else {
            return Vec::new();
        };

        targets
            .iter()
            .map(|target| {
                let prefix = KeyPrefix::new(target.resource);
                match (target.per_entity, mutation.entity()) {
                    (true, Some(entity)) => prefix.scoped(entity),
                    _ => prefix,
                }
            })
            .collect()
    }
}

impl Default for InvalidationMap {
    fn default() -> Self {
        Self::empty()
            .on(MutationKind::TicketReply, keys::TICKET_MESSAGES, true)
            .on(MutationKind::TicketReply, keys::SUPPORT_TICKETS, false)
            .on(MutationKind::TicketStatusChange, keys::SUPPORT_TICKETS, false)
            .on(
                MutationKind::KnowledgeDocumentChange,
                keys::KNOWLEDGE_DOCUMENTS,
                false,
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_map() {
        let map = InvalidationMap::default();

        let reply = map.prefixes(&Mutation::TicketReply {
            ticket_id: "t-9".into(),
        });
        assert_eq!(
            reply,
            vec![
                KeyPrefix::new(keys::TICKET_MESSAGES).scoped("t-9"),
                KeyPrefix::new(keys::SUPPORT_TICKETS),
            ]
        );

        let status = map.prefixes(&Mutation::TicketStatusChange {
            ticket_id: "t-9".into(),
        });
        assert_eq!(status, vec![KeyPrefix::new(keys::SUPPORT_TICKETS)]);

        let upload = map.prefixes(&Mutation::KnowledgeDocumentChange);
        assert_eq!(upload, vec![KeyPrefix::new(keys::KNOWLEDGE_DOCUMENTS)]);
    }

    #[test]
    fn test_empty_map_invalidates_nothing() {
        let map = InvalidationMap::empty();
        assert!(map.prefixes(&Mutation::KnowledgeDocumentChange).is_empty());
    }
}
