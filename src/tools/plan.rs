//! Execution plans produced by operation builders.

use crate::db::ExecutionMode;
use crate::sql::{Identifier, Statement};
use crate::tools::format::OutputFormat;

/// How the rows of an executed statement become a result.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Every row, as a row set.
    Rows,
    /// The first row as a mapping; empty when nothing matched.
    Row,
    /// "OK: executed successfully" plus the affected-row count.
    Status,
    /// Boolean outcome of a backend signal, keyed by the first column.
    Signal { action: SignalAction, pid: i64 },
    /// CSV text; "No data found" when empty.
    Csv,
    /// Ad-hoc query rows rendered in the requested format.
    Query(OutputFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Terminate,
    Cancel,
}

impl SignalAction {
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Terminate => "terminated",
            Self::Cancel => "cancelled",
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Terminate => "terminate",
            Self::Cancel => "cancel",
        }
    }
}

/// What a render plan reports once its statements ran.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderReport {
    Status,
    /// "OK: analyzed N tables in schema S"
    AnalyzedSchema(Identifier),
}

/// A built operation, ready for the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Run one statement in `mode`.
    Run {
        statement: Statement,
        mode: ExecutionMode,
        shape: Shape,
    },
    /// Run a `SELECT format(...)` render statement, then execute its output
    /// in the same transaction.
    Render {
        render: Statement,
        report: RenderReport,
    },
    /// Fetch a table's column definitions and rows, then emit a SQL dump.
    Dump {
        schema: Identifier,
        table: Identifier,
    },
}

impl Plan {
    pub fn run(statement: Statement, mode: ExecutionMode, shape: Shape) -> Self {
        Self::Run {
            statement,
            mode,
            shape,
        }
    }

    /// Read-only statement returning every row.
    pub fn rows(statement: Statement) -> Self {
        Self::run(statement, ExecutionMode::ReadOnly, Shape::Rows)
    }

    /// Read-only statement returning its first row.
    pub fn row(statement: Statement) -> Self {
        Self::run(statement, ExecutionMode::ReadOnly, Shape::Row)
    }

    /// Mutating statement inside a transaction.
    pub fn transactional(statement: Statement) -> Self {
        Self::run(statement, ExecutionMode::Transactional, Shape::Status)
    }

    /// Mutating statement outside any transaction.
    pub fn autocommit(statement: Statement) -> Self {
        Self::run(statement, ExecutionMode::Autocommit, Shape::Status)
    }

    /// Statement text, when the plan has a single statement.
    pub fn statement(&self) -> Option<&Statement> {
        match self {
            Self::Run { statement, .. } => Some(statement),
            Self::Render { render, .. } => Some(render),
            Self::Dump { .. } => None,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Run { mode, .. } => *mode,
            Self::Render { .. } => ExecutionMode::Transactional,
            Self::Dump { .. } => ExecutionMode::ReadOnly,
        }
    }
}
