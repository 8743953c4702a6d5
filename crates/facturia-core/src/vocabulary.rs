//! Category vocabulary and free-text category resolution
//!
//! Two closed, disjoint category lists (one per direction), each with a
//! catch-all member. The resolver maps a loose hint such as "Factura de Luz"
//! onto exactly one member of the right list, or reports it unresolved.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::Direction;

/// Minimum hint length for the hint-inside-term containment check.
/// Shorter hints ("a", "de") are contained in too many terms to be useful.
const MIN_CONTAINED_HINT: usize = 3;

/// The closed category taxonomy
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    income: Vec<String>,
    expense: Vec<String>,
    income_catch_all: String,
    expense_catch_all: String,
}

impl Vocabulary {
    /// Build a vocabulary, enforcing the taxonomy invariants
    ///
    /// Terms are lowercased. Both lists must be non-empty and disjoint, and
    /// each catch-all must be a member of its own list.
    pub fn new(
        income: Vec<String>,
        expense: Vec<String>,
        income_catch_all: &str,
        expense_catch_all: &str,
    ) -> Result<Self> {
        let income: Vec<String> = income.iter().map(|t| t.trim().to_lowercase()).collect();
        let expense: Vec<String> = expense.iter().map(|t| t.trim().to_lowercase()).collect();
        let income_catch_all = income_catch_all.trim().to_lowercase();
        let expense_catch_all = expense_catch_all.trim().to_lowercase();

        if income.is_empty() || expense.is_empty() {
            return Err(Error::Config(
                "Both income and expense vocabularies must be non-empty".into(),
            ));
        }
        if let Some(shared) = income.iter().find(|t| expense.contains(t)) {
            return Err(Error::Config(format!(
                "Category '{}' appears in both income and expense vocabularies",
                shared
            )));
        }
        if !income.contains(&income_catch_all) {
            return Err(Error::Config(format!(
                "Income catch-all '{}' is not in the income vocabulary",
                income_catch_all
            )));
        }
        if !expense.contains(&expense_catch_all) {
            return Err(Error::Config(format!(
                "Expense catch-all '{}' is not in the expense vocabulary",
                expense_catch_all
            )));
        }

        Ok(Self {
            income,
            expense,
            income_catch_all,
            expense_catch_all,
        })
    }

    /// Categories for a direction, in declared order
    pub fn terms(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expense,
        }
    }

    pub fn catch_all(&self, direction: Direction) -> &str {
        match direction {
            Direction::Income => &self.income_catch_all,
            Direction::Expense => &self.expense_catch_all,
        }
    }

    /// Case-insensitive membership
    pub fn contains(&self, direction: Direction, category: &str) -> bool {
        let category = category.trim().to_lowercase();
        self.terms(direction).iter().any(|t| *t == category)
    }

    /// Which list a term belongs to, if any
    pub fn direction_of(&self, category: &str) -> Option<Direction> {
        Direction::all()
            .iter()
            .copied()
            .find(|&d| self.contains(d, category))
    }
}

/// How a hint was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    Exact,
    Synonym,
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub category: String,
    pub method: ResolutionMethod,
}

/// Maps free-text hints onto vocabulary members
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    vocabulary: Vocabulary,
    synonyms: HashMap<String, String>,
}

impl CategoryResolver {
    pub fn new(vocabulary: Vocabulary, synonyms: HashMap<String, String>) -> Self {
        let synonyms = synonyms
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_lowercase()))
            .collect();
        Self {
            vocabulary,
            synonyms,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Resolve a hint within a direction's vocabulary
    ///
    /// First match wins:
    /// 1. exact (case-insensitive, trimmed)
    /// 2. synonym table, only if the target is in this direction's list
    /// 3. containment, in declared vocabulary order: the hint contains the
    ///    term or the term contains the hint (underscores read as spaces)
    ///
    /// Returns `None` when nothing matches.
    pub fn resolve(&self, hint: &str, direction: Direction) -> Option<Resolution> {
        let hint = hint.trim().to_lowercase();
        if hint.is_empty() {
            return None;
        }
        let terms = self.vocabulary.terms(direction);

        if let Some(term) = terms.iter().find(|t| **t == hint) {
            return Some(Resolution {
                category: term.clone(),
                method: ResolutionMethod::Exact,
            });
        }

        if let Some(target) = self.synonyms.get(&hint) {
            if terms.contains(target) {
                return Some(Resolution {
                    category: target.clone(),
                    method: ResolutionMethod::Synonym,
                });
            }
        }

        let spaced_hint = spaced(&hint);
        terms
            .iter()
            .find(|term| {
                let spaced_term = spaced(term);
                spaced_hint.contains(&spaced_term)
                    || (spaced_hint.chars().count() >= MIN_CONTAINED_HINT
                        && spaced_term.contains(&spaced_hint))
            })
            .map(|term| Resolution {
                category: term.clone(),
                method: ResolutionMethod::Substring,
            })
    }
}

fn spaced(s: &str) -> String {
    s.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn resolver() -> CategoryResolver {
        PipelineConfig::embedded().unwrap().resolver()
    }

    #[test]
    fn test_every_member_resolves_to_itself() {
        let r = resolver();
        for &direction in Direction::all() {
            for term in r.vocabulary().terms(direction).to_vec() {
                let padded = format!("  {}  ", term.to_uppercase());
                let res = r.resolve(&padded, direction).unwrap();
                assert_eq!(res.category, term);
                assert_eq!(res.method, ResolutionMethod::Exact);
            }
        }
    }

    #[test]
    fn test_synonym_respects_direction() {
        let r = resolver();
        let res = r.resolve("Luz", Direction::Expense).unwrap();
        assert_eq!(res.category, "factura_servicios");
        assert_eq!(res.method, ResolutionMethod::Synonym);

        // "salario" maps to an income category, so it cannot resolve as an expense
        // through the synonym table
        assert_ne!(
            r.resolve("salario", Direction::Expense).map(|r| r.method),
            Some(ResolutionMethod::Synonym)
        );
        assert_eq!(
            r.resolve("salario", Direction::Income).unwrap().category,
            "sueldo"
        );
    }

    #[test]
    fn test_containment() {
        let r = resolver();
        let res = r.resolve("pago alquiler", Direction::Expense).unwrap();
        assert_eq!(res.category, "alquiler");
        assert_eq!(res.method, ResolutionMethod::Substring);

        assert_eq!(
            r.resolve("compras supermercado", Direction::Expense)
                .unwrap()
                .category,
            "supermercado"
        );
        assert_eq!(
            r.resolve("impuestos municipales", Direction::Expense)
                .unwrap()
                .category,
            "impuestos"
        );
        // hint contained in the term
        assert_eq!(
            r.resolve("cobro", Direction::Income).unwrap().category,
            "cobro_servicios"
        );
    }

    #[test]
    fn test_unresolved() {
        let r = resolver();
        assert_eq!(r.resolve("viajes", Direction::Expense), None);
        assert_eq!(r.resolve("", Direction::Expense), None);
        assert_eq!(r.resolve("   ", Direction::Income), None);
        // a word in common is not containment
        assert_eq!(r.resolve("servicios profesionales", Direction::Expense), None);
        assert_eq!(r.resolve("factura de gas natural", Direction::Expense), None);
    }

    #[test]
    fn test_short_hint_not_matched_inside_terms() {
        let r = resolver();
        // "de" and "dep" both sit inside "deposito"; only the longer hint counts
        assert_eq!(r.resolve("de", Direction::Income), None);
        assert_eq!(r.resolve("dep", Direction::Income).unwrap().category, "deposito");
        assert_eq!(r.resolve("al", Direction::Expense), None);
        assert_eq!(
            r.resolve("alq", Direction::Expense).unwrap().category,
            "alquiler"
        );
    }

    #[test]
    fn test_multiword_synonyms() {
        let r = resolver();
        let res = r.resolve("Factura de Luz", Direction::Expense).unwrap();
        assert_eq!(res.category, "factura_servicios");
        assert_eq!(res.method, ResolutionMethod::Synonym);
    }

    #[test]
    fn test_vocabulary_invariants() {
        let ok = Vocabulary::new(
            vec!["a_in".into(), "otro_in".into()],
            vec!["b_out".into(), "otro_out".into()],
            "otro_in",
            "OTRO_OUT",
        )
        .unwrap();
        assert_eq!(ok.catch_all(Direction::Expense), "otro_out");
        assert_eq!(ok.direction_of("A_IN"), Some(Direction::Income));
        assert_eq!(ok.direction_of("zzz"), None);

        let overlap = Vocabulary::new(
            vec!["shared".into()],
            vec!["shared".into()],
            "shared",
            "shared",
        );
        assert!(overlap.is_err());

        let bad_catch_all = Vocabulary::new(vec!["a".into()], vec!["b".into()], "x", "b");
        assert!(bad_catch_all.is_err());

        let empty = Vocabulary::new(vec![], vec!["b".into()], "", "b");
        assert!(empty.is_err());
    }
}
