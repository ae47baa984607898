use serde_json::Value;

use super::models::{
    ActionDefinition, KvStateItem, KvStateKind, SetStateItem, SetStateKind, TreeStateKind,
    TreeStateNode,
};
use crate::protocol::payload::{
    parse_name, ActionPayload, ComponentNode, ComponentRef, DisplayNameChange, DisplayNameState,
    KvEntry,
};
use crate::protocol::{PayloadError, StateOp, Target};

/// A typed store request derived from one payload item
#[derive(Debug, Clone, PartialEq)]
pub enum StateMutation {
    CreateNode(TreeStateNode),
    UpsertNode(TreeStateNode),
    MoveNode {
        app_ref_id: i64,
        kind: TreeStateKind,
        name: String,
        parent_node: Option<String>,
    },
    DeleteNode {
        app_ref_id: i64,
        kind: TreeStateKind,
        name: String,
    },
    CreateKv(KvStateItem),
    UpsertKv(KvStateItem),
    DeleteKv {
        app_ref_id: i64,
        kind: KvStateKind,
        key: String,
    },
    CreateSetValue(SetStateItem),
    ReplaceSetValue {
        app_ref_id: i64,
        kind: SetStateKind,
        before: String,
        after: String,
    },
    DeleteSetValue {
        app_ref_id: i64,
        kind: SetStateKind,
        value: String,
    },
    CreateAction(ActionDefinition),
    UpsertAction(ActionDefinition),
    DeleteAction {
        app_ref_id: i64,
        display_name: String,
    },
}

impl StateMutation {
    /// Decode table: the (operation, target) pair selects the item schema.
    ///
    /// One item usually yields one mutation; a display-name item lists
    /// several names and yields one mutation per name, in order.
    /// `app_ref_id` always comes from the sender's connection, never from
    /// the item itself.
    pub fn decode(
        app_ref_id: i64,
        op: StateOp,
        target: Target,
        item: &Value,
    ) -> Result<Vec<Self>, PayloadError> {
        match target {
            Target::Components => Self::component(app_ref_id, op, item).map(|m| vec![m]),
            Target::Dependencies => {
                Self::kv(app_ref_id, KvStateKind::Dependencies, op, target, item).map(|m| vec![m])
            }
            Target::DragShadow => {
                Self::kv(app_ref_id, KvStateKind::DragShadow, op, target, item).map(|m| vec![m])
            }
            Target::DottedLineSquare => {
                Self::kv(app_ref_id, KvStateKind::DottedLineSquare, op, target, item)
                    .map(|m| vec![m])
            }
            Target::DisplayName => Self::display_name(app_ref_id, op, target, item),
            Target::Action => Self::action(app_ref_id, op, target, item).map(|m| vec![m]),
            Target::Nothing | Target::Apps | Target::Resource => {
                Err(PayloadError::Unsupported { op, target })
            }
        }
    }

    fn component(app_ref_id: i64, op: StateOp, item: &Value) -> Result<Self, PayloadError> {
        let kind = TreeStateKind::Components;
        if op == StateOp::Delete {
            return Ok(StateMutation::DeleteNode {
                app_ref_id,
                kind,
                name: ComponentRef::parse(item)?,
            });
        }

        let node = ComponentNode::parse(item)?;
        if op == StateOp::Move {
            return Ok(StateMutation::MoveNode {
                app_ref_id,
                kind,
                name: node.display_name,
                parent_node: node.parent_node,
            });
        }

        let content = node.content();
        let tree_node =
            TreeStateNode::new(app_ref_id, kind, node.display_name, node.parent_node, content);
        Ok(match op {
            StateOp::Create => StateMutation::CreateNode(tree_node),
            _ => StateMutation::UpsertNode(tree_node),
        })
    }

    fn kv(
        app_ref_id: i64,
        kind: KvStateKind,
        op: StateOp,
        target: Target,
        item: &Value,
    ) -> Result<Self, PayloadError> {
        match op {
            StateOp::Delete => Ok(StateMutation::DeleteKv {
                app_ref_id,
                kind,
                key: parse_name("key", item)?,
            }),
            StateOp::Move => Err(PayloadError::Unsupported { op, target }),
            StateOp::Create => {
                let entry = KvEntry::parse(item)?;
                Ok(StateMutation::CreateKv(KvStateItem::new(
                    app_ref_id,
                    kind,
                    entry.key,
                    entry.value.to_string(),
                )))
            }
            StateOp::Update | StateOp::CreateOrUpdate | StateOp::Put => {
                let entry = KvEntry::parse(item)?;
                Ok(StateMutation::UpsertKv(KvStateItem::new(
                    app_ref_id,
                    kind,
                    entry.key,
                    entry.value.to_string(),
                )))
            }
        }
    }

    fn display_name(
        app_ref_id: i64,
        op: StateOp,
        target: Target,
        item: &Value,
    ) -> Result<Vec<Self>, PayloadError> {
        let kind = SetStateKind::DisplayName;
        match op {
            StateOp::Create => {
                let DisplayNameState(names) = DisplayNameState::parse(item)?;
                Ok(names
                    .into_iter()
                    .map(|name| {
                        StateMutation::CreateSetValue(SetStateItem::new(app_ref_id, kind, name))
                    })
                    .collect())
            }
            StateOp::Delete => {
                let DisplayNameState(names) = DisplayNameState::parse(item)?;
                Ok(names
                    .into_iter()
                    .map(|value| StateMutation::DeleteSetValue {
                        app_ref_id,
                        kind,
                        value,
                    })
                    .collect())
            }
            StateOp::Update | StateOp::CreateOrUpdate | StateOp::Put => {
                let change = DisplayNameChange::parse(item)?;
                Ok(vec![StateMutation::ReplaceSetValue {
                    app_ref_id,
                    kind,
                    before: change.before,
                    after: change.after,
                }])
            }
            StateOp::Move => Err(PayloadError::Unsupported { op, target }),
        }
    }

    fn action(
        app_ref_id: i64,
        op: StateOp,
        target: Target,
        item: &Value,
    ) -> Result<Self, PayloadError> {
        match op {
            StateOp::Delete => Ok(StateMutation::DeleteAction {
                app_ref_id,
                display_name: parse_name("displayName", item)?,
            }),
            StateOp::Move => Err(PayloadError::Unsupported { op, target }),
            StateOp::Create | StateOp::Update | StateOp::CreateOrUpdate | StateOp::Put => {
                let action = ActionPayload::parse(item)?;
                let definition = ActionDefinition::new(
                    app_ref_id,
                    action.display_name,
                    action.action_type,
                    action.resource_id,
                    Value::Object(action.content).to_string(),
                    Value::Object(action.transformer).to_string(),
                    action.trigger_mode,
                );
                Ok(match op {
                    StateOp::Create => StateMutation::CreateAction(definition),
                    _ => StateMutation::UpsertAction(definition),
                })
            }
        }
    }
}
