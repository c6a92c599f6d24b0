//! Relationship mutation commands for one2many / many2many fields.
//!
//! The server accepts x2many writes as a list of `[code, id, payload]`
//! triples. [`Command`] is the typed form; the numeric encoding only exists
//! in [`Command::to_wire`] and [`Command::from_wire`].

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a new target record with these values and link it.
    Create(Map<String, Value>),
    /// Write values on a linked target record.
    Update(i64, Map<String, Value>),
    /// Unlink and delete the target record.
    Delete(i64),
    /// Unlink the target record, keeping it on the server.
    Unlink(i64),
    /// Link an existing target record.
    Link(i64),
    /// Unlink every target record.
    Clear,
    /// Replace the whole set of linked records.
    Replace(Vec<i64>),
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::Create(_) => 0,
            Command::Update(..) => 1,
            Command::Delete(_) => 2,
            Command::Unlink(_) => 3,
            Command::Link(_) => 4,
            Command::Clear => 5,
            Command::Replace(_) => 6,
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            Command::Create(values) => json!([0, 0, values]),
            Command::Update(id, values) => json!([1, id, values]),
            Command::Delete(id) => json!([2, id, 0]),
            Command::Unlink(id) => json!([3, id, 0]),
            Command::Link(id) => json!([4, id, 0]),
            Command::Clear => json!([5, 0, 0]),
            Command::Replace(ids) => json!([6, 0, ids]),
        }
    }

    /// Decode one wire triple. Short forms such as `[5]` or `[4, id]` are accepted.
    pub fn from_wire(value: &Value) -> Option<Command> {
        let items = value.as_array()?;
        let code = items.first()?.as_u64()?;
        let id = || items.get(1).and_then(Value::as_i64);
        let values = || {
            items
                .get(2)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        };

        let command = match code {
            0 => Command::Create(values()),
            1 => Command::Update(id()?, values()),
            2 => Command::Delete(id()?),
            3 => Command::Unlink(id()?),
            4 => Command::Link(id()?),
            5 => Command::Clear,
            6 => {
                let ids = items
                    .get(2)?
                    .as_array()?
                    .iter()
                    .map(Value::as_i64)
                    .collect::<Option<Vec<_>>>()?;
                Command::Replace(ids)
            }
            _ => return None,
        };
        Some(command)
    }

    /// Apply commands to an id list, in order, the way the server would.
    ///
    /// `Create` and `Update` leave the list untouched since the id of a
    /// created record is only known after the write.
    pub fn apply(commands: &[Command], ids: &mut Vec<i64>) {
        for command in commands {
            match command {
                Command::Replace(new_ids) => {
                    ids.clear();
                    for id in new_ids {
                        if !ids.contains(id) {
                            ids.push(*id);
                        }
                    }
                }
                Command::Clear => ids.clear(),
                Command::Link(id) => {
                    if !ids.contains(id) {
                        ids.push(*id);
                    }
                }
                Command::Unlink(id) | Command::Delete(id) => ids.retain(|i| i != id),
                Command::Create(_) | Command::Update(..) => {}
            }
        }
    }
}

/// Encode a command list as the server expects it.
pub(crate) fn encode(commands: &[Command]) -> Value {
    Value::Array(commands.iter().map(Command::to_wire).collect())
}

/// Decode a wire command list. `None` if any element is not a command.
pub(crate) fn decode(value: &Value) -> Option<Vec<Command>> {
    value.as_array()?.iter().map(Command::from_wire).collect()
}

/// `true` when a wire command list starts over from an empty set, so the
/// result does not depend on the ids already linked.
pub(crate) fn replaces_all(value: &Value) -> bool {
    matches!(
        decode(value).as_deref(),
        Some([Command::Replace(_) | Command::Clear, ..])
    )
}
