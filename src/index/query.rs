//! Query Index
//!
//! Ordered, read-only view over the entries of one scan. Every query
//! preserves index order and returns borrowed entries.
//!
//! @module index/query

use serde::Serialize;

use super::entry::{Entry, Target};

/// The result of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryIndex {
    entries: Vec<Entry>,
}

impl QueryIndex {
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// Every entry, in index order
    pub fn all(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Entries carrying at least one annotation named `name`
    pub fn with_name(&self, name: &str) -> Vec<&Entry> {
        if name.is_empty() {
            return Vec::new();
        }
        self.select(|e| e.has_annotation(name))
    }

    /// Entries carrying at least one annotation whose name starts with `prefix`
    pub fn with_prefix(&self, prefix: &str) -> Vec<&Entry> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.select(|e| e.has_annotation_prefix(prefix))
    }

    /// Functions and methods annotated `name` that return a value of type `ty`.
    ///
    /// Type comparison is textual.
    pub fn with_name_and_result_type(&self, name: &str, ty: &str) -> Vec<&Entry> {
        if name.is_empty() || ty.is_empty() {
            return Vec::new();
        }
        self.select(|e| e.function().is_some() && e.has_annotation(name) && e.has_result_type(ty))
    }

    pub fn types(&self) -> Vec<&Entry> {
        self.select(Entry::is_type)
    }

    pub fn functions(&self) -> Vec<&Entry> {
        self.select(Entry::is_func)
    }

    pub fn methods(&self) -> Vec<&Entry> {
        self.select(Entry::is_method)
    }

    fn select(&self, pred: impl Fn(&Entry) -> bool) -> Vec<&Entry> {
        self.entries.iter().filter(|e| pred(e)).collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            entries: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            stats.annotations += entry.annotations.len();
            match entry.target {
                Target::Type { .. } => stats.types += 1,
                Target::Method { .. } => stats.methods += 1,
                Target::Func(_) => stats.functions += 1,
                Target::Bare => stats.bare += 1,
            }
        }
        stats
    }
}

impl<'a> IntoIterator for &'a QueryIndex {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Counts over a finished index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub entries: usize,
    pub types: usize,
    pub functions: usize,
    pub methods: usize,
    pub bare: usize,
    pub annotations: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries ({} types, {} functions, {} methods, {} bare), {} annotations",
            self.entries, self.types, self.functions, self.methods, self.bare, self.annotations
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotation;
    use crate::index::entry::Function;
    use crate::provider::Field;

    fn entry(target: Target, annotations: &[(&str, &str)]) -> Entry {
        Entry {
            target,
            annotations: annotations
                .iter()
                .map(|(n, v)| Annotation::new(*n, *v))
                .collect(),
            ..Default::default()
        }
    }

    fn func(name: &str, result: &str) -> Function {
        Function {
            name: name.to_string(),
            parameters: vec![],
            results: vec![Field::new("", result)],
        }
    }

    fn index() -> QueryIndex {
        QueryIndex::from_entries(vec![
            entry(
                Target::Func(func("Foo", "string")),
                &[("Bar", "x=1,y=2")],
            ),
            entry(
                Target::Type {
                    struct_name: "Svc".to_string(),
                },
                &[("Inject", "name=svc"), ("BarBaz", "a=b")],
            ),
            entry(
                Target::Method {
                    struct_name: "Svc".to_string(),
                    func: func("Get", "error"),
                },
                &[("Bar", "x=2")],
            ),
            entry(Target::Bare, &[("Route", "path=/")]),
            entry(
                Target::Func(func("Other", "string")),
                &[("Route", "path=/x")],
            ),
        ])
    }

    fn func_names(entries: &[&Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| {
                e.func_name()
                    .or(e.struct_name())
                    .unwrap_or("<bare>")
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_with_name_subset_and_complement() {
        let index = index();
        let matched = index.with_name("Bar");
        assert_eq!(func_names(&matched), vec!["Foo", "Get"]);

        for e in &matched {
            assert!(index.all().contains(*e));
            assert!(e.has_annotation("Bar"));
        }
        let complement: Vec<&Entry> = index
            .iter()
            .filter(|e| !matched.iter().any(|m| std::ptr::eq(*m, *e)))
            .collect();
        assert_eq!(complement.len(), 3);
        assert!(complement.iter().all(|e| !e.has_annotation("Bar")));
    }

    #[test]
    fn test_with_prefix_preserves_order() {
        let index = index();
        assert_eq!(
            func_names(&index.with_prefix("Bar")),
            vec!["Foo", "Svc", "Get"]
        );
    }

    #[test]
    fn test_with_name_and_result_type() {
        let index = index();
        assert_eq!(
            func_names(&index.with_name_and_result_type("Bar", "string")),
            vec!["Foo"]
        );
        assert_eq!(
            func_names(&index.with_name_and_result_type("Bar", "error")),
            vec!["Get"]
        );
        assert!(index.with_name_and_result_type("Route", "error").is_empty());
        assert!(index.with_name_and_result_type("Bar", "str").is_empty());
    }

    #[test]
    fn test_empty_filters_match_nothing() {
        let index = index();
        assert!(index.with_name("").is_empty());
        assert!(index.with_prefix("").is_empty());
        assert!(index.with_name_and_result_type("", "string").is_empty());
        assert!(index.with_name_and_result_type("Bar", "").is_empty());
    }

    #[test]
    fn test_classification_filters() {
        let index = index();
        assert_eq!(func_names(&index.types()), vec!["Svc"]);
        assert_eq!(func_names(&index.functions()), vec!["Foo", "Other"]);
        assert_eq!(func_names(&index.methods()), vec!["Get"]);
    }

    #[test]
    fn test_stats() {
        let stats = index().stats();
        assert_eq!(
            stats,
            IndexStats {
                entries: 5,
                types: 1,
                functions: 2,
                methods: 1,
                bare: 1,
                annotations: 6,
            }
        );
        assert_eq!(
            stats.to_string(),
            "5 entries (1 types, 2 functions, 1 methods, 1 bare), 6 annotations"
        );
    }

    #[test]
    fn test_serializes_as_sequence() {
        let json = serde_json::to_value(index()).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0]["funcName"], "Foo");
        assert_eq!(entries[1]["structName"], "Svc");
    }

    #[test]
    fn test_empty_index() {
        let index = QueryIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!((&index).into_iter().count(), 0);
    }
}
