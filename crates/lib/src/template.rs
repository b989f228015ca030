//! Text templates with embedded expressions.
//!
//! Templates are used for the build status context. Everything outside
//! `{{ ... }}` is copied verbatim; the text between the braces is an expression
//! evaluated in the template scope.
//!
//! # Names
//!
//! Template expressions see the same names as other expressions, plus `pr`:
//! the pull request when it is already known (seeded from the event or fetched
//! by an earlier expression), `nil` otherwise.
//!
//! # Example
//!
//! ```
//! use lambuild_lib::template::{Segment, Template};
//!
//! let template = Template::parse("AWS CodeBuild ({{ event.name }})").unwrap();
//! assert_eq!(template.segments().len(), 3);
//! assert!(matches!(&template.segments()[0], Segment::Literal(s) if s == "AWS CodeBuild ("));
//! ```

use std::fmt;

use mlua::prelude::*;
use serde::{Deserialize, Deserializer, de::Error as _};
use thiserror::Error;

use crate::expr::{ExprError, Program, Scope};

#[derive(Debug, Error)]
pub enum TemplateError {
  #[error("unclosed expression at position {0}")]
  Unclosed(usize),

  #[error("empty expression at position {0}")]
  Empty(usize),

  #[error(transparent)]
  Compile(ExprError),

  #[error("failed to render template: {0}")]
  Render(ExprError),

  #[error("`{expr}` renders a {actual}, which has no text form")]
  TypeMismatch { expr: String, actual: &'static str },
}

/// A piece of a parsed template.
#[derive(Clone, PartialEq, Eq)]
pub enum Segment {
  /// Text copied to the output as is
  Literal(String),

  /// An expression whose value is rendered as text
  Expr(Program),
}

impl fmt::Debug for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Segment::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
      Segment::Expr(program) => f.debug_tuple("Expr").field(&program.source()).finish(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
  source: String,
  segments: Vec<Segment>,
}

impl Template {
  /// Parses and compiles a template.
  ///
  /// # Errors
  ///
  /// Returns an error if a `{{` has no matching `}}`, if the braces are empty,
  /// or if an embedded expression does not compile.
  pub fn parse(source: &str) -> Result<Self, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some(open) = rest.find("{{") {
      if open > 0 {
        segments.push(Segment::Literal(rest[..open].to_string()));
      }

      let body_start = open + 2;
      let Some(close) = rest[body_start..].find("}}") else {
        return Err(TemplateError::Unclosed(offset + open));
      };

      let body = rest[body_start..body_start + close].trim();
      if body.is_empty() {
        return Err(TemplateError::Empty(offset + open));
      }
      segments.push(Segment::Expr(Program::compile(body).map_err(TemplateError::Compile)?));

      let consumed = body_start + close + 2;
      offset += consumed;
      rest = &rest[consumed..];
    }

    if !rest.is_empty() {
      segments.push(Segment::Literal(rest.to_string()));
    }

    Ok(Self {
      source: source.to_string(),
      segments,
    })
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// Renders the template in the template scope derived from `scope`.
  pub fn render(&self, scope: &Scope<'_>) -> Result<String, TemplateError> {
    let scope = scope.for_template().map_err(TemplateError::Render)?;
    let mut out = String::with_capacity(self.source.len());

    for segment in &self.segments {
      match segment {
        Segment::Literal(text) => out.push_str(text),
        Segment::Expr(program) => match scope.eval(program).map_err(TemplateError::Render)? {
          LuaValue::Nil => {}
          LuaValue::String(s) => out.push_str(&s.to_string_lossy()),
          LuaValue::Integer(i) => out.push_str(&i.to_string()),
          LuaValue::Number(n) => out.push_str(&n.to_string()),
          LuaValue::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
          other => {
            return Err(TemplateError::TypeMismatch {
              expr: program.source().to_string(),
              actual: other.type_name(),
            });
          }
        },
      }
    }

    Ok(out)
  }
}

impl TryFrom<String> for Template {
  type Error = TemplateError;

  fn try_from(source: String) -> Result<Self, Self::Error> {
    Self::parse(&source)
  }
}

impl<'de> Deserialize<'de> for Template {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let source = String::deserialize(deserializer)?;
    Self::parse(&source).map_err(D::Error::custom)
  }
}
