// Query safety validator for read-only analytical SQL

use regex::Regex;
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

pub const DEFAULT_MAX_LENGTH: usize = 50_000;

pub const DEFAULT_FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "GRANT", "REVOKE", "TRUNCATE",
    "EXECUTE", "EXEC", "CALL", "DECLARE", "SET",
];

/// `(pattern, reason)` pairs matched case-insensitively against the query.
pub const DEFAULT_DANGEROUS_PATTERNS: &[(&str, &str)] = &[
    (r"(?s);.*(?:DROP|DELETE|INSERT)", "Multiple statements detected"),
    (r"--.*(?:DROP|DELETE)", "Dangerous comment detected"),
    (r"xp_cmdshell", "Command execution detected"),
    (r"into\s+outfile", "File write detected"),
    (r"pg_sleep", "Sleep function detected"),
];

const QUOTED_IDENTIFIER: &str = r#"(?i)"([a-f0-9-]{36})""#;
const CANONICAL_UUID: &str =
    r"(?i)^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$";

/// Why a query was refused. The `Display` text is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlRejection {
    #[error("SQL must be non-empty string")]
    Empty,

    #[error("SQL too long (max {max})")]
    TooLong { max: usize },

    #[error("Only SELECT queries allowed")]
    NotSelect,

    #[error("Forbidden keyword: {0}")]
    ForbiddenKeyword(String),

    #[error("{0}")]
    DangerousPattern(String),

    #[error("Multiple statements not allowed")]
    MultipleStatements,

    #[error("Only SELECT statements allowed")]
    NotSelectStatement,

    #[error("SELECT INTO not allowed")]
    SelectInto,

    #[error("SQL parsing error: {0}")]
    Parse(String),

    #[error("Invalid identifier format: {0}")]
    InvalidIdentifier(String),
}

/// Classifies a query as safe to forward to a read-only backend.
///
/// Checks run in a fixed order and the first failure wins: emptiness,
/// length, leading `SELECT`, keyword denylist, dangerous patterns, a
/// single-statement parse that must yield a query without `INTO`, and finally
/// the shape of quoted resource ids.
/// The validator holds no mutable state, so results are deterministic.
#[derive(Debug, Clone)]
pub struct SqlValidator {
    max_length: usize,
    keywords: Vec<(String, Regex)>,
    patterns: Vec<(Regex, String)>,
    quoted_identifier: Regex,
    canonical_uuid: Regex,
}

impl SqlValidator {
    pub fn builder() -> SqlValidatorBuilder {
        SqlValidatorBuilder::default()
    }

    /// Accept `sql` or explain why not.
    pub fn validate(&self, sql: &str) -> Result<(), SqlRejection> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlRejection::Empty);
        }

        if sql.chars().count() > self.max_length {
            return Err(SqlRejection::TooLong {
                max: self.max_length,
            });
        }

        if !sql.to_uppercase().starts_with("SELECT") {
            return Err(SqlRejection::NotSelect);
        }

        if let Some((keyword, _)) = self.keywords.iter().find(|(_, re)| re.is_match(sql)) {
            return Err(SqlRejection::ForbiddenKeyword(keyword.clone()));
        }

        if let Some((_, reason)) = self.patterns.iter().find(|(re, _)| re.is_match(sql)) {
            return Err(SqlRejection::DangerousPattern(reason.clone()));
        }

        let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
            .map_err(|e| SqlRejection::Parse(e.to_string()))?;
        if statements.len() != 1 {
            return Err(SqlRejection::MultipleStatements);
        }
        match &statements[0] {
            Statement::Query(query) if selects_into(&query.body) => {
                return Err(SqlRejection::SelectInto)
            }
            Statement::Query(_) => {}
            _ => return Err(SqlRejection::NotSelectStatement),
        }

        for captures in self.quoted_identifier.captures_iter(sql) {
            let id = &captures[1];
            if !self.canonical_uuid.is_match(id) {
                return Err(SqlRejection::InvalidIdentifier(id.to_string()));
            }
        }

        Ok(())
    }

    /// Convenience form of [`validate`](Self::validate) returning
    /// `(accepted, reason)`.
    pub fn check(&self, sql: &str) -> (bool, Option<String>) {
        match self.validate(sql) {
            Ok(()) => (true, None),
            Err(rejection) => (false, Some(rejection.to_string())),
        }
    }
}

impl Default for SqlValidator {
    fn default() -> Self {
        // Every default pattern is a literal above.
        SqlValidator::builder()
            .build()
            .expect("default SQL validator patterns compile")
    }
}

/// Builder for a validator with a custom denylist.
#[derive(Debug, Clone)]
pub struct SqlValidatorBuilder {
    max_length: usize,
    keywords: Vec<String>,
    patterns: Vec<(String, String)>,
}

impl Default for SqlValidatorBuilder {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            keywords: DEFAULT_FORBIDDEN_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            patterns: DEFAULT_DANGEROUS_PATTERNS
                .iter()
                .map(|(p, r)| (p.to_string(), r.to_string()))
                .collect(),
        }
    }
}

impl SqlValidatorBuilder {
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Replace the keyword denylist.
    pub fn forbidden_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn forbid_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    /// Add a case-insensitive pattern rejected with `reason`.
    pub fn dangerous_pattern(mut self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.patterns.push((pattern.into(), reason.into()));
        self
    }

    pub fn clear_dangerous_patterns(mut self) -> Self {
        self.patterns.clear();
        self
    }

    pub fn build(self) -> Result<SqlValidator, regex::Error> {
        let keywords = self
            .keywords
            .into_iter()
            .map(|keyword| {
                let keyword = keyword.to_uppercase();
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&keyword)))?;
                Ok((keyword, re))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        let patterns = self
            .patterns
            .into_iter()
            .map(|(pattern, reason)| Ok((Regex::new(&format!("(?i){}", pattern))?, reason)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(SqlValidator {
            max_length: self.max_length,
            keywords,
            patterns,
            quoted_identifier: Regex::new(QUOTED_IDENTIFIER)?,
            canonical_uuid: Regex::new(CANONICAL_UUID)?,
        })
    }
}

/// `SELECT ... INTO` creates a table, wherever it sits in the query.
fn selects_into(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_some(),
        SetExpr::Query(query) => selects_into(&query.body),
        SetExpr::SetOperation { left, right, .. } => selects_into(left) || selects_into(right),
        _ => false,
    }
}
