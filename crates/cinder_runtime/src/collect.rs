//! Field collection.
//!
//! Flattens a selection set against one concrete object type into field
//! groups keyed by response key, expanding fragments and applying
//! `@skip`/`@include`.

use crate::coerce::literal_value;
use crate::schema::Schema;
use crate::value::Value;
use crate::variables::Variables;
use cinder_syntax::ast::{Directive, Document, Field, Selection, SelectionSet};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::debug;

/// Selections sharing a response key, in document order.
pub type FieldGroup<'a> = Vec<&'a Field>;

/// Field groups in first-seen key order.
pub type GroupedFields<'a> = IndexMap<&'a str, FieldGroup<'a>>;

/// Collects the fields of `selection_sets` that apply to `object_type`.
///
/// Passing several selection sets merges them key-wise, which is how the
/// sub-selections of a field group are combined.
pub fn collect_fields<'a>(
    schema: &Schema,
    document: &'a Document,
    variables: &Variables,
    object_type: &str,
    selection_sets: impl IntoIterator<Item = &'a SelectionSet>,
) -> GroupedFields<'a> {
    let mut collector = Collector {
        schema,
        document,
        variables,
        object_type,
        visited: FxHashSet::default(),
        groups: GroupedFields::new(),
    };
    for set in selection_sets {
        collector.collect(set);
    }
    collector.groups
}

struct Collector<'a, 'c> {
    schema: &'c Schema,
    document: &'a Document,
    variables: &'c Variables,
    object_type: &'c str,
    visited: FxHashSet<&'a str>,
    groups: GroupedFields<'a>,
}

impl<'a> Collector<'a, '_> {
    fn collect(&mut self, set: &'a SelectionSet) {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if !should_include(&field.directives, self.variables) {
                        continue;
                    }
                    self.groups
                        .entry(field.response_key())
                        .or_default()
                        .push(field);
                }
                Selection::FragmentSpread(spread) => {
                    if !should_include(&spread.directives, self.variables) {
                        continue;
                    }
                    let name = spread.name.as_str();
                    if !self.visited.insert(name) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragment(name) else {
                        debug!(fragment = name, "skipping spread of unknown fragment");
                        continue;
                    };
                    if !self
                        .schema
                        .type_applies(fragment.type_condition.as_str(), self.object_type)
                    {
                        continue;
                    }
                    self.collect(&fragment.selection_set);
                }
                Selection::InlineFragment(inline) => {
                    if !should_include(&inline.directives, self.variables) {
                        continue;
                    }
                    if let Some(condition) = &inline.type_condition {
                        if !self.schema.type_applies(condition.as_str(), self.object_type) {
                            continue;
                        }
                    }
                    self.collect(&inline.selection_set);
                }
            }
        }
    }
}

/// Evaluates `@skip` and `@include`.
pub fn should_include(directives: &[Directive], variables: &Variables) -> bool {
    let condition = |name: &str| {
        directives
            .iter()
            .find(|d| d.name.as_str() == name)
            .and_then(|d| d.argument("if"))
            .map(|arg| literal_value(&arg.value, variables) == Value::Boolean(true))
    };

    if condition("skip") == Some(true) {
        return false;
    }
    condition("include") != Some(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, InterfaceDef, ObjectDef, SchemaBuilder, UnionDef};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").with_field(FieldDef::new("a", "Int")))
            .add_type(InterfaceDef::new("Pet").with_field(FieldDef::new("name", "String")))
            .add_type(
                ObjectDef::new("Dog")
                    .with_interface("Pet")
                    .with_field(FieldDef::new("name", "String"))
                    .with_field(FieldDef::new("barks", "Boolean")),
            )
            .add_type(ObjectDef::new("Cat").with_field(FieldDef::new("meows", "Boolean")))
            .add_type(UnionDef::new("Animal", ["Dog", "Cat"]))
            .build()
            .unwrap()
    }

    fn keys(source: &str, object_type: &str, variables: &Variables) -> Vec<String> {
        let schema = schema();
        let doc = cinder_syntax::parse_executable(source).unwrap();
        let op = doc.operations().next().unwrap();
        collect_fields(&schema, &doc, variables, object_type, [&op.selection_set])
            .keys()
            .map(|k| (*k).to_string())
            .collect()
    }

    #[test]
    fn test_groups_by_response_key_in_order() {
        let schema = schema();
        let doc = cinder_syntax::parse_executable("{ b: a a c: a b: a }").unwrap();
        let op = doc.operations().next().unwrap();
        let groups = collect_fields(&schema, &doc, &Variables::new(), "Query", [&op.selection_set]);

        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), ["b", "a", "c"]);
        assert_eq!(groups["b"].len(), 2);
    }

    #[test]
    fn test_directive_truth_table() {
        let vars = Variables::new();
        assert!(keys("{ a @skip(if: true) @include(if: true) }", "Query", &vars).is_empty());
        assert!(keys("{ a @skip(if: false) @include(if: false) }", "Query", &vars).is_empty());
        assert_eq!(keys("{ a @skip(if: false) }", "Query", &vars), ["a"]);
        assert_eq!(keys("{ a @include(if: true) }", "Query", &vars), ["a"]);
        assert!(keys("{ a @include(if: false) }", "Query", &vars).is_empty());
    }

    #[test]
    fn test_directive_variables() {
        let mut vars = Variables::new();
        vars.insert("hide".into(), Value::Boolean(true));
        assert!(keys("query ($hide: Boolean!) { a @skip(if: $hide) }", "Query", &vars).is_empty());
    }

    #[test]
    fn test_type_conditions() {
        let vars = Variables::new();
        let source = "{ ... on Dog { barks } ... on Cat { meows } ... on Pet { name } ... on Animal { __typename } ... { always } }";
        assert_eq!(keys(source, "Dog", &vars), ["barks", "name", "__typename", "always"]);
        assert_eq!(keys(source, "Cat", &vars), ["meows", "__typename", "always"]);
    }

    #[test]
    fn test_fragment_spreads() {
        let vars = Variables::new();
        let source = r"
            { ...DogFields ...DogFields ...CatFields ...Missing a }
            fragment DogFields on Dog { barks }
            fragment CatFields on Cat { meows }
        ";
        assert_eq!(keys(source, "Dog", &vars), ["barks", "a"]);
    }
}
