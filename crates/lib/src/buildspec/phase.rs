//! Conditional phase commands.
//!
//! Each entry of `phases.<phase>.commands` and `phases.<phase>.finally` is
//! either a plain command string or a mapping `{command, if}`. Entries whose
//! `if` is false are dropped when the buildspec is re-emitted.

use serde::{Deserialize, Deserializer, de::Error as _};
use serde_yaml::{Mapping, Value};

use crate::expr::{BoolExpr, ExprError, Scope, deserialize_optional};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub command: String,
  pub condition: Option<BoolExpr>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionalCommand {
  command: String,
  #[serde(rename = "if", default, deserialize_with = "deserialize_optional")]
  condition: Option<BoolExpr>,
}

impl<'de> Deserialize<'de> for Command {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    match Value::deserialize(deserializer)? {
      Value::String(command) => Ok(Self {
        command,
        condition: None,
      }),
      value @ Value::Mapping(_) => {
        let ConditionalCommand { command, condition } = serde_yaml::from_value(value).map_err(D::Error::custom)?;
        Ok(Self { command, condition })
      }
      other => Err(D::Error::custom(format!(
        "a command must be a string or a mapping, got {other:?}"
      ))),
    }
  }
}

/// The command lists of one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Phase {
  pub commands: Option<Vec<Command>>,
  pub finally: Option<Vec<Command>>,
}

/// Keeps the commands whose condition holds, in order.
pub fn filter_commands(commands: &[Command], scope: &Scope<'_>) -> Result<Vec<String>, ExprError> {
  let mut kept = Vec::with_capacity(commands.len());
  for command in commands {
    if let Some(condition) = &command.condition
      && !condition.run(scope)?
    {
      continue;
    }
    kept.push(command.command.clone());
  }
  Ok(kept)
}

/// Replaces every command list of `phases` in `document` by its filtered form.
pub(crate) fn apply(
  phases: &[(String, Phase)],
  document: &mut Mapping,
  scope: &Scope<'_>,
) -> Result<(), (String, ExprError)> {
  let Some(Value::Mapping(raw_phases)) = document.get_mut("phases") else {
    return Ok(());
  };

  for (name, phase) in phases {
    let Some(Value::Mapping(raw_phase)) = raw_phases.get_mut(name.as_str()) else {
      continue;
    };
    for (key, commands) in [("commands", &phase.commands), ("finally", &phase.finally)] {
      if let Some(commands) = commands {
        let kept = filter_commands(commands, scope).map_err(|e| (format!("phases.{name}.{key}"), e))?;
        raw_phase.insert(Value::from(key), crate::util::yaml::string_sequence(kept));
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expr::Evaluator;
  use crate::util::testutil::push_data;

  #[test]
  fn strings_and_conditional_entries_are_accepted() {
    let phase: Phase = serde_yaml::from_str(
      r#"
commands:
  - echo always
  - command: echo on push
    if: event.name == 'push'
  - command: echo never
    if: "false"
"#,
    )
    .unwrap();

    let commands = phase.commands.unwrap();
    assert_eq!(commands.len(), 3);
    assert!(commands[0].condition.is_none());
    assert_eq!(commands[1].condition.as_ref().unwrap().source(), "event.name == 'push'");
  }

  #[test]
  fn filter_keeps_order_and_drops_false_entries() {
    let phase: Phase = serde_yaml::from_str(
      r#"
commands:
  - echo one
  - command: echo two
    if: "false"
  - command: echo three
    if: event.name == 'push'
"#,
    )
    .unwrap();

    let data = push_data();
    let evaluator = Evaluator::new(&data).unwrap();
    let kept = filter_commands(phase.commands.as_deref().unwrap(), &evaluator.scope()).unwrap();
    assert_eq!(kept, vec!["echo one", "echo three"]);
  }

  #[test]
  fn non_string_command_is_rejected() {
    assert!(serde_yaml::from_str::<Phase>("commands:\n  - 1\n").is_err());
  }
}
