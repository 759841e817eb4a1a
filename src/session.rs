//! One analysis run: an interpreter with its analyses, fed by a trace

use crate::analysis::blame::{BlameAnalysis, BlameConfig, BlameReport};
use crate::analysis::nan::NanWatch;
use crate::config::Config;
use crate::debuginfo::{DebugInfoError, DebugInfoMap};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::ShadowError;
use crate::trace::{self, TraceEntry, TraceError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error(transparent)]
    DebugInfo(#[from] DebugInfoError),

    #[error(transparent)]
    Shadow(#[from] ShadowError),
}

impl SessionError {
    /// The fatal interpreter error behind this failure, if any
    pub fn shadow_error(&self) -> Option<&ShadowError> {
        match self {
            SessionError::Shadow(err) => Some(err),
            SessionError::Trace(err) => err.shadow_error(),
            SessionError::DebugInfo(_) => None,
        }
    }
}

pub struct Session {
    interpreter: Interpreter,
    debug_info: DebugInfoMap,
}

impl Session {
    pub fn new(blame: BlameConfig, debug_info: DebugInfoMap, nan: bool) -> Self {
        let mut interpreter = Interpreter::new();
        interpreter.add_analysis(Box::new(BlameAnalysis::new(blame, debug_info.clone())));
        if nan {
            interpreter.add_analysis(Box::new(NanWatch::new()));
        }
        Session {
            interpreter,
            debug_info,
        }
    }

    /// Build a session from the command line, loading the debug table.
    ///
    /// A missing table is not an error: the report then carries no locations.
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let path = config.debug_info_path();
        let debug_info = if path.exists() {
            DebugInfoMap::load(&path)?
        } else {
            warn!(path = %path.display(), "no debug information, report will lack locations");
            DebugInfoMap::new()
        };
        Ok(Session::new(config.blame(), debug_info, config.nan))
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn debug_info(&self) -> &DebugInfoMap {
        &self.debug_info
    }

    /// Replay `entries`, run the post-analysis hooks and return the report.
    ///
    /// `None` when the run performed no floating operation and no root was configured.
    pub fn run(&mut self, entries: &[TraceEntry]) -> Result<Option<BlameReport>, SessionError> {
        trace::replay(&mut self.interpreter, entries)?;
        self.finish()
    }

    /// Run the post-analysis hooks over whatever has been dispatched so far
    pub fn finish(&mut self) -> Result<Option<BlameReport>, SessionError> {
        self.interpreter.finish()?;
        if let Some(nan) = self.interpreter.analysis::<NanWatch>() {
            info!(loads = nan.loads(), stores = nan.stores(), "NaN values observed");
        }
        Ok(self
            .interpreter
            .analysis::<BlameAnalysis>()
            .and_then(|blame| blame.report().cloned()))
    }

    /// Consume the session, keeping the debug table for display
    pub fn into_debug_info(self) -> DebugInfoMap {
        self.debug_info
    }
}
