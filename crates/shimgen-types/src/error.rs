use crate::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of diagnostics of each severity kept in storage.
///
/// Totals keep counting past the cap.
pub const MAX_DIAGNOSTICS: usize = 20;

/// Diagnostic severity.
///
/// `Fatal` aborts the enclosing function, attribute or class wrap only; it
/// never stops the rest of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Diagnostic category, determined by code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Argument,
    Result,
    Attribute,
    Module,
    Naming,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument => write!(f, "argument"),
            Self::Result => write!(f, "result"),
            Self::Attribute => write!(f, "attribute"),
            Self::Module => write!(f, "module"),
            Self::Naming => write!(f, "naming"),
        }
    }
}

/// Numeric diagnostic code (100–599).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    // ── Argument marshaling (100–199) ──
    pub const UNSUPPORTED_ARGUMENT: Self = Self(100);

    // ── Result marshaling (200–299) ──
    pub const UNSUPPORTED_RESULT: Self = Self(200);

    // ── Class attributes (300–399) ──
    pub const UNSUPPORTED_ATTRIBUTE: Self = Self(300);

    // ── Module assembly (400–499) ──
    pub const UNSUPPORTED_FEATURE: Self = Self(400);
    pub const UNSUPPORTED_VARIABLE: Self = Self(401);

    // ── Naming (500–599) ──
    pub const MODULE_NAME_UNAVAILABLE: Self = Self(500);

    /// Get the category for this code.
    pub fn category(self) -> DiagnosticCategory {
        match self.0 {
            100..=199 => DiagnosticCategory::Argument,
            200..=299 => DiagnosticCategory::Result,
            300..=399 => DiagnosticCategory::Attribute,
            400..=499 => DiagnosticCategory::Module,
            _ => DiagnosticCategory::Naming,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a diagnostic was raised: module, optional symbol inside it, span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub span: Span,
}

impl Location {
    pub fn module(module: impl Into<String>, span: Span) -> Self {
        Self {
            module: module.into(),
            symbol: None,
            span,
        }
    }

    pub fn symbol(module: impl Into<String>, symbol: impl Into<String>, span: Span) -> Self {
        Self {
            module: module.into(),
            symbol: Some(symbol.into()),
            span,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            Some(symbol) => write!(f, "{}::{} ({})", self.module, symbol, self.span),
            None => write!(f, "{} ({})", self.module, self.span),
        }
    }
}

/// A structured wrapping diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// Derived from `code`.
    pub category: DiagnosticCategory,
    pub message: String,
    pub location: Location,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        severity: Severity,
        message: impl Into<String>,
        location: Location,
    ) -> Self {
        Self {
            code,
            severity,
            category: code.category(),
            message: message.into(),
            location,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::new(code, Severity::Warning, message, location)
    }

    pub fn fatal(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self::new(code, Severity::Fatal, message, location)
    }

    fn code_prefix(&self) -> &'static str {
        match self.severity {
            Severity::Warning => "W",
            Severity::Fatal => "F",
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}{} [{}] {}",
            self.location,
            self.severity,
            self.code_prefix(),
            self.code,
            self.category,
            self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Accumulating diagnostics sink.
///
/// Reporting never affects control flow; callers decide what to drop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub fatal: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub total_fatal: usize,
    pub total_warnings: usize,
    #[serde(skip)]
    limit: Option<usize>,
}

impl Diagnostics {
    /// Create an empty sink capped at [`MAX_DIAGNOSTICS`] per severity.
    pub fn new() -> Self {
        Self::with_limit(MAX_DIAGNOSTICS)
    }

    /// Create an empty sink with a custom storage cap.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn cap(&self) -> usize {
        self.limit.unwrap_or(MAX_DIAGNOSTICS)
    }

    /// Record a diagnostic, respecting the storage cap.
    pub fn report(&mut self, diagnostic: Diagnostic) {
        let cap = self.cap();
        match diagnostic.severity {
            Severity::Fatal => {
                if self.fatal.len() < cap {
                    self.fatal.push(diagnostic);
                }
                self.total_fatal += 1;
            }
            Severity::Warning => {
                if self.warnings.len() < cap {
                    self.warnings.push(diagnostic);
                }
                self.total_warnings += 1;
            }
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.total_fatal > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.total_warnings > 0
    }

    pub fn is_empty(&self) -> bool {
        self.total_fatal == 0 && self.total_warnings == 0
    }

    /// Merge `other` into `self`.
    ///
    /// Stored diagnostics are kept up to `self`'s cap. Totals add up, and a
    /// total never counts fewer diagnostics than its stored list holds.
    pub fn extend(&mut self, other: Diagnostics) {
        let cap = self.cap();
        self.total_fatal += other.total_fatal.max(other.fatal.len());
        self.total_warnings += other.total_warnings.max(other.warnings.len());
        let room = cap.saturating_sub(self.fatal.len());
        self.fatal.extend(other.fatal.into_iter().take(room));
        let room = cap.saturating_sub(self.warnings.len());
        self.warnings.extend(other.warnings.into_iter().take(room));
    }
}
