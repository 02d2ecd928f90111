//! Engine-aware search predicates over `name` and `email`.

use sqlx::{Database, Encode, QueryBuilder, Type};

/// Pattern-matching flavour offered by a storage engine.
pub trait SearchStrategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// SQL operator applied to both searchable columns.
    fn operator(&self) -> &'static str;

    fn pattern(&self, term: &str) -> String {
        format!("%{term}%")
    }
}

/// Engines with a native case-insensitive `ILIKE` (PostgreSQL).
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitivePattern;

impl SearchStrategy for CaseInsensitivePattern {
    fn name(&self) -> &'static str {
        "case-insensitive"
    }

    fn operator(&self) -> &'static str {
        "ILIKE"
    }
}

/// Standard `LIKE`; case sensitivity follows the engine's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericPattern;

impl SearchStrategy for GenericPattern {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn operator(&self) -> &'static str {
        "LIKE"
    }
}

/// Appends ` WHERE (name <op> ? OR email <op> ?)` when a term is present.
///
/// The term is always bound, never spliced into the SQL text.
pub fn push_search_filter<'args, DB>(
    qb: &mut QueryBuilder<'args, DB>,
    strategy: &dyn SearchStrategy,
    term: Option<&str>,
) where
    DB: Database,
    String: Encode<'args, DB> + Type<DB>,
{
    let Some(term) = term else {
        return;
    };
    let pattern = strategy.pattern(term);
    let op = strategy.operator();

    qb.push(" WHERE (name ")
        .push(op)
        .push(" ")
        .push_bind(pattern.clone())
        .push(" OR email ")
        .push(op)
        .push(" ")
        .push_bind(pattern)
        .push(")");
}
