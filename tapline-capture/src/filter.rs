//! Compiled BPF programs
//!
//! A [`FilterProgram`] is compiled against one activated session and can only
//! be attached to that session, and only while its link-layer type is the
//! one the program was compiled for.

use std::fmt;
use std::sync::Arc;
use tapline_core::{CaptureError, CompiledFilter, Linktype, Result};
use uuid::Uuid;

use crate::session::Session;

/// Compiled filter bound to the session it was compiled against
#[derive(Clone)]
pub struct FilterProgram {
    compiled: Arc<dyn CompiledFilter>,
    session_id: Uuid,
    linktype: Linktype,
}

impl FilterProgram {
    pub(crate) fn new(compiled: Arc<dyn CompiledFilter>, session_id: Uuid, linktype: Linktype) -> Self {
        Self {
            compiled,
            session_id,
            linktype,
        }
    }

    /// Compile `expression` with optimisation and an unknown netmask
    pub fn compile<S: Session>(session: &mut S, expression: &str) -> Result<Self> {
        session.compile_filter(expression)
    }

    /// Attach this program to `session`
    pub fn attach<S: Session>(&self, session: &mut S) -> Result<()> {
        session.set_filter(self)
    }

    /// Expression the program was compiled from
    pub fn expression(&self) -> &str {
        self.compiled.expression()
    }

    /// Link-layer type at compile time
    pub fn linktype(&self) -> Linktype {
        self.linktype
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub(crate) fn compiled(&self) -> &dyn CompiledFilter {
        self.compiled.as_ref()
    }

    pub(crate) fn check_target(&self, session_id: Uuid, linktype: Linktype) -> Result<()> {
        if session_id != self.session_id {
            return Err(CaptureError::generic(format!(
                "Filter '{}' was compiled for a different session",
                self.expression()
            )));
        }
        if linktype != self.linktype {
            return Err(CaptureError::generic(format!(
                "Filter '{}' was compiled for link type {}, session now uses {}",
                self.expression(),
                self.linktype,
                linktype
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for FilterProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProgram")
            .field("expression", &self.expression())
            .field("session_id", &self.session_id)
            .field("linktype", &self.linktype)
            .finish()
    }
}

impl fmt::Display for FilterProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expression())
    }
}

/// What [`Session::set_filter`] accepts
#[derive(Debug, Clone)]
pub enum FilterSource {
    /// Expression compiled against the target session
    Expression(String),
    /// Program compiled earlier
    Program(FilterProgram),
}

impl From<&str> for FilterSource {
    fn from(expression: &str) -> Self {
        Self::Expression(expression.to_string())
    }
}

impl From<String> for FilterSource {
    fn from(expression: String) -> Self {
        Self::Expression(expression)
    }
}

impl From<&String> for FilterSource {
    fn from(expression: &String) -> Self {
        Self::Expression(expression.clone())
    }
}

impl From<FilterProgram> for FilterSource {
    fn from(program: FilterProgram) -> Self {
        Self::Program(program)
    }
}

impl From<&FilterProgram> for FilterSource {
    fn from(program: &FilterProgram) -> Self {
        Self::Program(program.clone())
    }
}
