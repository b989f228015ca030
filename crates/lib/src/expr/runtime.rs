//! The Lua environment expressions run in.
//!
//! Every [`Evaluator`] owns a fresh Lua state. Expressions do not see the Lua
//! globals directly: they run against an environment table holding a subset of
//! the standard library, the event data, the fact accessors and a few helpers.

use mlua::prelude::*;
use mlua::SerializeOptions;
use regex::Regex;
use serde::Serialize;

use super::{ExprError, Program};
use crate::context::{ContextError, Data};

/// Standard library entries visible to expressions.
const STDLIB: &[&str] = &[
  "assert", "error", "ipairs", "math", "next", "pairs", "select", "string", "table", "tonumber", "tostring", "type",
  "utf8",
];

fn serialize_options() -> SerializeOptions {
  SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false)
}

fn to_lua<T: Serialize + ?Sized>(lua: &Lua, value: &T) -> LuaResult<LuaValue> {
  lua.to_value_with(value, serialize_options())
}

/// Owns the Lua state used to evaluate the expressions of one generation.
pub struct Evaluator {
  lua: Lua,
  data: Data,
  env: LuaTable,
}

impl Evaluator {
  pub fn new(data: &Data) -> Result<Self, ExprError> {
    let lua = Lua::new();
    let env = create_environment(&lua, data)?;
    Ok(Self {
      lua,
      data: data.clone(),
      env,
    })
  }

  /// The root scope: event data, accessors and helpers, without `item`.
  pub fn scope(&self) -> Scope<'_> {
    Scope {
      lua: &self.lua,
      data: &self.data,
      env: self.env.clone(),
    }
  }
}

fn create_environment(lua: &Lua, data: &Data) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;

  let globals = lua.globals();
  for name in STDLIB {
    env.set(*name, globals.get::<LuaValue>(*name)?)?;
  }

  env.set("event", to_lua(lua, &data.event)?)?;
  env.set("repo", to_lua(lua, &data.repository)?)?;
  env.set("sha", data.sha.as_str())?;
  env.set("ref", data.r#ref.as_str())?;
  env.set("aws", to_lua(lua, &data.aws)?)?;

  env.set("getCommit", accessor(lua, data, Data::commit)?)?;
  env.set("getCommitMessage", accessor(lua, data, Data::commit_message)?)?;
  env.set("getPR", accessor(lua, data, Data::pull_request)?)?;
  env.set("getPRNumber", accessor(lua, data, |d| Ok(d.pr_number()?.unwrap_or(0)))?)?;
  env.set("getPRFiles", accessor(lua, data, Data::pr_files)?)?;
  env.set("getPRFileNames", accessor(lua, data, Data::pr_file_names)?)?;
  env.set("getPRLabelNames", accessor(lua, data, Data::pr_label_names)?)?;

  register_helpers(lua, &env)?;

  Ok(env)
}

/// Wraps a lazy fact of [`Data`] as a zero-argument Lua function.
fn accessor<T, F>(lua: &Lua, data: &Data, fetch: F) -> LuaResult<LuaFunction>
where
  T: Serialize,
  F: Fn(&Data) -> Result<T, ContextError> + 'static,
{
  let data = data.clone();
  lua.create_function(move |lua, ()| {
    let value = fetch(&data).map_err(LuaError::external)?;
    to_lua(lua, &value)
  })
}

fn register_helpers(lua: &Lua, env: &LuaTable) -> LuaResult<()> {
  let regexp = lua.create_table()?;
  regexp.set(
    "match",
    lua.create_function(|_, (pattern, text): (String, String)| {
      let re = Regex::new(&pattern).map_err(LuaError::external)?;
      Ok(re.is_match(&text))
    })?,
  )?;
  env.set("regexp", regexp)?;

  let util = lua.create_table()?;
  util.set(
    "contains",
    lua.create_function(|_, (list, needle): (LuaTable, LuaValue)| {
      for value in list.sequence_values::<LuaValue>() {
        if value? == needle {
          return Ok(true);
        }
      }
      Ok(false)
    })?,
  )?;
  util.set(
    "any",
    lua.create_function(|_, (list, predicate): (LuaTable, LuaFunction)| {
      for value in list.sequence_values::<LuaValue>() {
        if predicate.call::<bool>(value?)? {
          return Ok(true);
        }
      }
      Ok(false)
    })?,
  )?;
  util.set(
    "startswith",
    lua.create_function(|_, (text, prefix): (String, String)| Ok(text.starts_with(&prefix)))?,
  )?;
  env.set("util", util)?;

  Ok(())
}

/// A set of names an expression can see.
///
/// Scopes are cheap handles into the evaluator's Lua state. Extending a scope
/// copies the environment table, so the parent scope is never changed.
#[derive(Clone)]
pub struct Scope<'a> {
  lua: &'a Lua,
  data: &'a Data,
  env: LuaTable,
}

impl<'a> Scope<'a> {
  /// A child scope where `item` is bound to `param`. A null param is exposed
  /// as an empty table.
  pub fn with_item(&self, param: &serde_yaml::Value) -> Result<Scope<'a>, ExprError> {
    let item = if param.is_null() {
      LuaValue::Table(self.lua.create_table()?)
    } else {
      to_lua(self.lua, param)?
    };
    self.extend("item", item)
  }

  /// A child scope for templates, where `pr` is the pull request if it is
  /// already known. Building it never fetches anything.
  pub(crate) fn for_template(&self) -> Result<Scope<'a>, ExprError> {
    let pr = match self.data.cached_pull_request() {
      Some(pr) => to_lua(self.lua, &pr)?,
      None => LuaValue::Nil,
    };
    self.extend("pr", pr)
  }

  fn extend(&self, name: &str, value: LuaValue) -> Result<Scope<'a>, ExprError> {
    let env = self.lua.create_table()?;
    for pair in self.env.pairs::<LuaValue, LuaValue>() {
      let (key, value) = pair?;
      env.raw_set(key, value)?;
    }
    env.raw_set(name, value)?;

    Ok(Scope {
      lua: self.lua,
      data: self.data,
      env,
    })
  }

  pub(crate) fn eval(&self, program: &Program) -> Result<LuaValue, ExprError> {
    self
      .lua
      .load(program.chunk())
      .set_name(program.source())
      .set_environment(self.env.clone())
      .eval::<LuaValue>()
      .map_err(|e| ExprError::Evaluation {
        expr: program.source().to_string(),
        message: e.to_string(),
      })
  }
}
