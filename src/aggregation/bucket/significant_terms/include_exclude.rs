use common::BitSet;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::aggregation::agg_req::IncludeExcludeParam;
use crate::aggregation::values_source::StrColumn;
use crate::SigTermsError;

/// A compiled include or exclude parameter.
#[derive(Debug)]
enum TermMatcher {
    /// Matches terms whose whole text matches the regex.
    Regex(Regex),
    /// Matches terms equal to one of the values.
    Values(FxHashSet<String>),
}

impl TermMatcher {
    fn new(param: &IncludeExcludeParam) -> crate::Result<TermMatcher> {
        match param {
            IncludeExcludeParam::Regex(pattern) => {
                let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
                    SigTermsError::InvalidArgument(format!("Invalid regex `{pattern}`: {err}"))
                })?;
                Ok(TermMatcher::Regex(regex))
            }
            IncludeExcludeParam::Values(values) => {
                Ok(TermMatcher::Values(values.iter().cloned().collect()))
            }
        }
    }

    fn matches(&self, term: &[u8]) -> bool {
        let Ok(term) = std::str::from_utf8(term) else {
            return false;
        };
        match self {
            TermMatcher::Regex(regex) => regex.is_match(term),
            TermMatcher::Values(values) => values.contains(term),
        }
    }
}

/// Restricts the terms a significant terms aggregation considers.
///
/// A term is accepted if it matches the include parameter, when there is one, and does not
/// match the exclude parameter.
#[derive(Debug)]
pub struct IncludeExclude {
    include: Option<TermMatcher>,
    exclude: Option<TermMatcher>,
}

impl IncludeExclude {
    /// Compiles the include and exclude parameters.
    ///
    /// Returns `None` when both are unset. An invalid regex is an invalid argument.
    pub fn new(
        include: Option<&IncludeExcludeParam>,
        exclude: Option<&IncludeExcludeParam>,
    ) -> crate::Result<Option<IncludeExclude>> {
        if include.is_none() && exclude.is_none() {
            return Ok(None);
        }
        Ok(Some(IncludeExclude {
            include: include.map(TermMatcher::new).transpose()?,
            exclude: exclude.map(TermMatcher::new).transpose()?,
        }))
    }

    /// Returns true if `term` passes the filter.
    pub fn accept(&self, term: &[u8]) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |include| include.matches(term));
        included
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| exclude.matches(term))
    }

    /// Resolves the filter against the dictionary of a column, once per column.
    pub fn allowed_term_ords(&self, column: &StrColumn) -> BitSet {
        let num_terms = column.num_terms() as u32;
        let mut allowed = BitSet::with_max_value(num_terms);
        for (term_ord, term) in column.dictionary().enumerate() {
            if self.accept(term) {
                allowed.insert(term_ord as u32);
            }
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str) -> IncludeExcludeParam {
        IncludeExcludeParam::Regex(pattern.to_string())
    }

    fn values(values: &[&str]) -> IncludeExcludeParam {
        IncludeExcludeParam::Values(values.iter().map(|value| value.to_string()).collect())
    }

    #[test]
    fn test_no_filter() -> crate::Result<()> {
        assert!(IncludeExclude::new(None, None)?.is_none());
        Ok(())
    }

    #[test]
    fn test_regex_is_anchored() -> crate::Result<()> {
        let filter = IncludeExclude::new(Some(&regex("term.")), None)?.unwrap();
        assert!(filter.accept(b"terma"));
        assert!(!filter.accept(b"termab"));
        assert!(!filter.accept(b"a_terma"));
        Ok(())
    }

    #[test]
    fn test_include_and_exclude() -> crate::Result<()> {
        let filter = IncludeExclude::new(Some(&regex("term.*")), Some(&values(&["termc"])))?
            .unwrap();
        assert!(filter.accept(b"terma"));
        assert!(!filter.accept(b"termc"));
        assert!(!filter.accept(b"other"));

        let exclude_only = IncludeExclude::new(None, Some(&regex("c.*")))?.unwrap();
        assert!(exclude_only.accept(b"rust"));
        assert!(!exclude_only.accept(b"c++"));
        Ok(())
    }

    #[test]
    fn test_non_utf8_terms_never_match() -> crate::Result<()> {
        let include = IncludeExclude::new(Some(&regex(".*")), None)?.unwrap();
        assert!(!include.accept(&[0xff, 0xfe]));
        let exclude = IncludeExclude::new(None, Some(&regex(".*")))?.unwrap();
        assert!(exclude.accept(&[0xff, 0xfe]));
        Ok(())
    }

    #[test]
    fn test_invalid_regex() {
        let err = IncludeExclude::new(Some(&regex("(unclosed")), None).unwrap_err();
        assert!(matches!(err, SigTermsError::InvalidArgument(_)));
    }

    #[test]
    fn test_allowed_term_ords() -> crate::Result<()> {
        let column = StrColumn::from_docs(&[vec!["terma", "termb"], vec!["termc", "other"]]);
        let filter = IncludeExclude::new(Some(&regex("term.*")), Some(&values(&["termb"])))?
            .unwrap();
        let allowed = filter.allowed_term_ords(&column);
        let allowed_terms: Vec<&[u8]> = column
            .dictionary()
            .enumerate()
            .filter(|(term_ord, _)| allowed.contains(*term_ord as u32))
            .map(|(_, term)| term)
            .collect();
        assert_eq!(allowed_terms, vec![&b"terma"[..], b"termc"]);
        assert_eq!(allowed.len(), 2);
        Ok(())
    }
}
