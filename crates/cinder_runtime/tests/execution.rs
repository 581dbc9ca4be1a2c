//! Integration tests for query and mutation execution.

mod common;

use cinder_runtime::{
    EnumDef, EnumValueDef, ExecutionError, Executor, ExecutorConfig, FieldDef, FieldResolver,
    FieldValue, InputValueDef, InterfaceDef, ObjectDef, ParamDescriptor, ResolverError, Schema,
    SchemaBuilder, UnionDef, Value,
};
use common::{data, request, run};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct Dog {
    name: &'static str,
    barks: bool,
}

#[derive(Debug)]
struct Cat {
    name: &'static str,
    lives: i32,
}

fn pets_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(
            ObjectDef::new("Query")
                .with_field(
                    FieldDef::new("hello", "String")
                        .with_resolver(FieldResolver::accessor(|_| Ok("world".into()))),
                )
                .with_field(
                    FieldDef::new("number", "Int")
                        .with_resolver(FieldResolver::accessor(|_| Ok(42.into()))),
                )
                .with_field(
                    FieldDef::new("greet", "String")
                        .with_argument(InputValueDef::new("name", "String").with_default("stranger"))
                        .with_resolver(FieldResolver::resolver(
                            vec![ParamDescriptor::new("name", "String")],
                            |params| {
                                let name: String = params.require("name")?;
                                Ok(format!("Hello, {name}!").into())
                            },
                        )),
                )
                .with_field(
                    FieldDef::new("pets", "[Pet!]!").with_resolver(FieldResolver::accessor(|_| {
                        Ok(FieldValue::List(vec![
                            Ok(FieldValue::object(Dog {
                                name: "Rex",
                                barks: true,
                            })),
                            Ok(FieldValue::object(Cat {
                                name: "Tom",
                                lives: 9,
                            })),
                        ]))
                    })),
                )
                .with_field(FieldDef::new("animals", "[Animal]").with_resolver(
                    FieldResolver::accessor(|_| {
                        Ok(FieldValue::list([
                            FieldValue::typed_object("Dog", Dog { name: "Fido", barks: false }),
                            FieldValue::typed_object("Cat", Cat { name: "Kit", lives: 3 }),
                        ]))
                    }),
                ))
                .with_field(
                    FieldDef::new("mood", "Mood")
                        .with_resolver(FieldResolver::accessor(|_| Ok(2.into()))),
                ),
        )
        .add_type(
            InterfaceDef::new("Pet")
                .with_field(FieldDef::new("name", "String!"))
                .with_resolve_type(|value| {
                    if value.downcast_ref::<Dog>().is_some() {
                        Some("Dog".to_string())
                    } else if value.downcast_ref::<Cat>().is_some() {
                        Some("Cat".to_string())
                    } else {
                        None
                    }
                }),
        )
        .add_type(
            ObjectDef::new("Dog")
                .with_interface("Pet")
                .with_field(FieldDef::new("name", "String!").with_resolver(
                    FieldResolver::accessor(|parent| {
                        let dog = parent
                            .downcast_ref::<Dog>()
                            .ok_or_else(|| ResolverError::message("not a dog"))?;
                        Ok(dog.name.into())
                    }),
                ))
                .with_field(FieldDef::new("barks", "Boolean").with_resolver(
                    FieldResolver::accessor(|parent| {
                        Ok(parent.downcast_ref::<Dog>().map_or(FieldValue::Null, |d| d.barks.into()))
                    }),
                )),
        )
        .add_type(
            ObjectDef::new("Cat")
                .with_interface("Pet")
                .with_field(FieldDef::new("name", "String!").with_resolver(
                    FieldResolver::accessor(|parent| {
                        let cat = parent
                            .downcast_ref::<Cat>()
                            .ok_or_else(|| ResolverError::message("not a cat"))?;
                        Ok(cat.name.into())
                    }),
                ))
                .with_field(FieldDef::new("lives", "Int").with_resolver(
                    FieldResolver::accessor(|parent| {
                        Ok(parent.downcast_ref::<Cat>().map_or(FieldValue::Null, |c| c.lives.into()))
                    }),
                )),
        )
        .add_type(UnionDef::new("Animal", ["Dog", "Cat"]))
        .add_type(
            EnumDef::new("Mood")
                .with_value(EnumValueDef::new("HAPPY").with_internal(1))
                .with_value(EnumValueDef::new("SLEEPY").with_internal(2)),
        )
        .build()
        .expect("schema builds")
}

/// Test that scalar leaves come back in selection order without errors.
#[tokio::test]
async fn test_scalar_leaves_in_selection_order() {
    let executor = Executor::new(pets_schema());
    let response = run(&executor, "{ number greeting: hello hello mood }").await;

    assert!(!response.has_errors());
    let data = response.data.unwrap();
    let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["number", "greeting", "hello", "mood"]);
    assert_eq!(
        serde_json::Value::from(data),
        json!({"number": 42, "greeting": "world", "hello": "world", "mood": "SLEEPY"})
    );
}

/// Test that repeated execution yields identical results.
#[tokio::test]
async fn test_idempotent_execution() {
    let executor = Executor::new(pets_schema());
    let source = "{ pets { name ... on Dog { barks } } animals { __typename } }";
    let first = run(&executor, source).await;
    let second = run(&executor, source).await;
    assert_eq!(first, second);
}

/// Test arguments, defaults and variables.
#[tokio::test]
async fn test_arguments_and_variables() {
    let executor = Executor::new(pets_schema());

    let response = run(&executor, r#"{ a: greet b: greet(name: "Ada") }"#).await;
    assert_eq!(data(&response), json!({"a": "Hello, stranger!", "b": "Hello, Ada!"}));

    let response = executor
        .execute(
            request("query ($who: String) { greet(name: $who) }").with_variable("who", "Grace"),
        )
        .await
        .unwrap();
    assert_eq!(data(&response), json!({"greet": "Hello, Grace!"}));
}

/// Test that variable coercion failures produce errors and no data.
#[tokio::test]
async fn test_variable_errors_produce_no_data() {
    let executor = Executor::new(pets_schema());
    let response = executor
        .execute(request("query Greet($who: String!) {\n  greet(name: $who)\n}"))
        .await
        .unwrap();

    assert!(!response.has_data());
    insta::assert_json_snapshot!(response, @r###"
    {
      "errors": [
        {
          "message": "Variable \"$who\" of required type \"String!\" was not provided.",
          "locations": [
            {
              "line": 1,
              "column": 13
            }
          ]
        }
      ]
    }
    "###);
}

/// Test interface type conditions and runtime type resolution.
#[tokio::test]
async fn test_inline_fragments_on_interface() {
    let executor = Executor::new(pets_schema());
    let response = run(
        &executor,
        "{ pets { __typename name ... on Dog { barks } ... on Cat { lives } ... { kind: __typename } } }",
    )
    .await;

    assert!(!response.has_errors());
    assert_eq!(
        data(&response),
        json!({"pets": [
            {"__typename": "Dog", "name": "Rex", "barks": true, "kind": "Dog"},
            {"__typename": "Cat", "name": "Tom", "lives": 9, "kind": "Cat"}
        ]})
    );
}

/// Test union members resolved from typed instances.
#[tokio::test]
async fn test_union_with_named_fragments() {
    let executor = Executor::new(pets_schema());
    let response = run(
        &executor,
        r"
        { animals { ...DogName ...CatName } }
        fragment DogName on Dog { name }
        fragment CatName on Cat { name lives }
        ",
    )
    .await;

    assert_eq!(
        data(&response),
        json!({"animals": [{"name": "Fido"}, {"name": "Kit", "lives": 3}]})
    );
}

/// Test the directive truth table through the executor.
#[tokio::test]
async fn test_skip_and_include() {
    let executor = Executor::new(pets_schema());
    let response = executor
        .execute(
            request(
                r"query ($yes: Boolean!, $no: Boolean!) {
                    a: hello @skip(if: true) @include(if: true)
                    b: hello @skip(if: false) @include(if: false)
                    c: hello @skip(if: false)
                    d: hello @include(if: $yes)
                    e: hello @skip(if: $yes)
                    f: hello @include(if: $no)
                    ... @skip(if: $no) { g: hello }
                }",
            )
            .with_variable("yes", true)
            .with_variable("no", false),
        )
        .await
        .unwrap();

    assert_eq!(data(&response), json!({"c": "world", "d": "world", "g": "world"}));
}

/// Test operation selection failures.
#[tokio::test]
async fn test_operation_selection() {
    let executor = Executor::new(pets_schema());
    let source = "query A { hello } query B { number }";

    let err = executor.execute(request(source)).await.unwrap_err();
    assert_eq!(err, ExecutionError::OperationNameRequired);

    let err = executor
        .execute(request(source).with_operation_name("C"))
        .await
        .unwrap_err();
    assert_eq!(err, ExecutionError::UnknownOperation("C".into()));

    let response = executor
        .execute(request(source).with_operation_name("B"))
        .await
        .unwrap();
    assert_eq!(data(&response), json!({"number": 42}));

    let err = executor
        .execute(request("mutation { hello }"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Schema is not configured to execute mutation operation."
    );
}

fn nested_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(
            ObjectDef::new("Query")
                .with_field(
                    FieldDef::new("outer", "Outer")
                        .with_resolver(FieldResolver::accessor(|_| Ok(json!({}).into()))),
                )
                .with_field(
                    FieldDef::new("strict", "Outer!")
                        .with_resolver(FieldResolver::accessor(|_| Ok(json!({}).into()))),
                )
                .with_field(
                    FieldDef::new("sibling", "String")
                        .with_resolver(FieldResolver::accessor(|_| Ok("ok".into()))),
                )
                .with_field(FieldDef::new("items", "[Int]").with_resolver(
                    FieldResolver::accessor(|_| {
                        Ok(FieldValue::List(
                            (0..6)
                                .map(|i| {
                                    if i % 2 == 0 {
                                        Err(ResolverError::message(format!("item {i} failed")))
                                    } else {
                                        Ok(FieldValue::from(i))
                                    }
                                })
                                .collect(),
                        ))
                    }),
                ))
                .with_field(FieldDef::new("matrix", "[[Int!]]").with_resolver(
                    FieldResolver::accessor(|_| Ok(json!([[1, 2], [3, null], []]).into())),
                )),
        )
        .add_type(
            ObjectDef::new("Outer")
                .with_field(FieldDef::new("inner", "Inner!").with_resolver(
                    FieldResolver::accessor(|_| Ok(json!({"other": "kept"}).into())),
                ))
                .with_field(
                    FieldDef::new("label", "String")
                        .with_resolver(FieldResolver::accessor(|_| Ok("outer".into()))),
                ),
        )
        .add_type(
            ObjectDef::new("Inner")
                .with_field(FieldDef::new("leaf", "String!").with_resolver(
                    FieldResolver::accessor(|_| Err(ResolverError::message("leaf failed"))),
                ))
                .with_field(FieldDef::new("other", "String")),
        )
        .build()
        .expect("schema builds")
}

/// Test that a non-null failure nulls the nearest nullable ancestor once.
#[tokio::test]
async fn test_non_null_bubbling() {
    let executor = Executor::new(nested_schema());
    let response = run(&executor, "{ outer { label inner { leaf other } } sibling }").await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "outer": null,
        "sibling": "ok"
      },
      "errors": [
        {
          "message": "leaf failed",
          "locations": [
            {
              "line": 1,
              "column": 25
            }
          ],
          "path": [
            "outer",
            "inner",
            "leaf"
          ]
        }
      ]
    }
    "###);
}

/// Test that a bubble reaching the root nulls all data.
#[tokio::test]
async fn test_non_null_bubbling_to_root() {
    let executor = Executor::new(nested_schema());
    let response = run(&executor, "{ sibling strict { inner { leaf } } }").await;

    assert_eq!(response.data, Some(Value::Null));
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "leaf failed");
}

/// Test that list completion keeps length and order and attributes element errors.
#[tokio::test]
async fn test_list_fidelity() {
    let executor = Executor::new(nested_schema());
    let response = run(&executor, "{ items }").await;

    assert_eq!(data(&response), json!({"items": [null, 1, null, 3, null, 5]}));
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 3);
    for error in &errors {
        let path = serde_json::to_value(error.path.as_ref().unwrap()).unwrap();
        let index = path[1].as_u64().unwrap();
        assert_eq!(path[0], "items");
        assert_eq!(index % 2, 0);
        assert_eq!(error.message, format!("item {index} failed"));
    }
}

/// Test nested lists with a non-null violation in an inner list.
#[tokio::test]
async fn test_nested_lists() {
    let executor = Executor::new(nested_schema());
    let response = run(&executor, "{ matrix }").await;

    assert_eq!(data(&response), json!({"matrix": [[1, 2], null, []]}));
    let errors = response.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        serde_json::to_value(&errors[0].path).unwrap(),
        json!(["matrix", 1, 1])
    );
}

/// Test that introspection fields are answered after the main pass and in
/// collected order.
#[tokio::test]
async fn test_introspection() {
    let executor = Executor::new(pets_schema());
    let response = run(
        &executor,
        r#"{
            __type(name: "Pet") { kind name possibleTypes { name } fields { name type { kind ofType { name } } } }
            hello
            __schema { queryType { name } mutationType { name } }
            __typename
        }"#,
    )
    .await;

    assert!(!response.has_errors(), "{:?}", response.errors);
    insta::assert_json_snapshot!(response.data, @r###"
    {
      "__type": {
        "kind": "INTERFACE",
        "name": "Pet",
        "possibleTypes": [
          {
            "name": "Dog"
          },
          {
            "name": "Cat"
          }
        ],
        "fields": [
          {
            "name": "name",
            "type": {
              "kind": "NON_NULL",
              "ofType": {
                "name": "String"
              }
            }
          }
        ]
      },
      "hello": "world",
      "__schema": {
        "queryType": {
          "name": "Query"
        },
        "mutationType": null
      },
      "__typename": "Query"
    }
    "###);
}

/// Test enum values and deprecation filtering through introspection.
#[tokio::test]
async fn test_introspection_enum_values() {
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(ObjectDef::new("Query").with_field(FieldDef::new("level", "Level")))
        .add_type(
            EnumDef::new("Level")
                .with_value(EnumValueDef::new("LOW"))
                .with_value(EnumValueDef::new("OLD").with_deprecation("gone")),
        )
        .build()
        .unwrap();
    let executor = Executor::new(schema);
    let response = run(
        &executor,
        r#"{
            current: __type(name: "Level") { enumValues { name } }
            all: __type(name: "Level") { enumValues(includeDeprecated: true) { name isDeprecated deprecationReason } }
            missing: __type(name: "Nope") { name }
        }"#,
    )
    .await;

    assert_eq!(
        data(&response),
        json!({
            "current": {"enumValues": [{"name": "LOW"}]},
            "all": {"enumValues": [
                {"name": "LOW", "isDeprecated": false, "deprecationReason": null},
                {"name": "OLD", "isDeprecated": true, "deprecationReason": "gone"}
            ]},
            "missing": null
        })
    );
}

/// Test that disabled introspection reports an error per field.
#[tokio::test]
async fn test_introspection_disabled() {
    let executor = Executor::with_config(
        pets_schema(),
        ExecutorConfig::default().with_introspection(false),
    );
    let response = run(&executor, "{ hello __schema { queryType { name } } }").await;

    assert_eq!(data(&response), json!({"hello": "world", "__schema": null}));
    assert_eq!(response.errors.unwrap()[0].message, "Introspection is disabled.");
}

#[derive(Debug)]
struct User {
    name: &'static str,
}

fn counting_schema(calls: Arc<AtomicUsize>) -> Schema {
    let user = FieldValue::object(User { name: "Ada" });
    let FieldValue::Object(instance) = user else {
        unreachable!()
    };

    SchemaBuilder::new()
        .query_type("Query")
        .add_type(ObjectDef::new("Query").with_field(
            FieldDef::new("users", "[User]").with_resolver(FieldResolver::accessor(move |_| {
                Ok(FieldValue::list([instance.clone(), instance.clone()]))
            })),
        ))
        .add_type(ObjectDef::new("User").with_field(
            FieldDef::new("name", "String").with_resolver(FieldResolver::accessor(move |parent| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(parent.downcast_ref::<User>().map_or(FieldValue::Null, |u| u.name.into()))
            })),
        ))
        .build()
        .unwrap()
}

/// Test that a shared instance is completed once per selection.
#[tokio::test]
async fn test_object_memoization() {
    for (memoize, expected_calls) in [(true, 1), (false, 2)] {
        let calls = Arc::new(AtomicUsize::new(0));
        let executor = Executor::with_config(
            counting_schema(Arc::clone(&calls)),
            ExecutorConfig::default().with_memoize_objects(memoize),
        );
        let response = run(&executor, "{ users { name } }").await;

        assert_eq!(data(&response), json!({"users": [{"name": "Ada"}, {"name": "Ada"}]}));
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }
}

/// Test that occurrences of an instance wait for its in-flight completion.
#[tokio::test(start_paused = true)]
async fn test_object_memoization_shares_in_flight_work() {
    for (memoize, expected_calls) in [(true, 1), (false, 3)] {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let FieldValue::Object(instance) = FieldValue::object(User { name: "Ada" }) else {
            unreachable!()
        };
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(ObjectDef::new("Query").with_field(
                FieldDef::new("users", "[User]").with_resolver(FieldResolver::accessor(move |_| {
                    Ok(FieldValue::list([instance.clone(), instance.clone(), instance.clone()]))
                })),
            ))
            .add_type(ObjectDef::new("User").with_field(FieldDef::new("name", "String").with_resolver(
                FieldResolver::accessor_async(move |parent| {
                    let counter = Arc::clone(&counter);
                    let name = parent.downcast_ref::<User>().map(|u| u.name);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok::<_, ResolverError>(name.map_or(FieldValue::Null, FieldValue::from))
                    }
                }),
            )))
            .build()
            .unwrap();
        let executor = Executor::with_config(
            schema,
            ExecutorConfig::default().with_memoize_objects(memoize),
        );
        let response = run(&executor, "{ users { name } }").await;

        assert_eq!(
            data(&response),
            json!({"users": [{"name": "Ada"}, {"name": "Ada"}, {"name": "Ada"}]})
        );
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    }
}

/// Test that a failed completion is not shared between occurrences.
#[tokio::test]
async fn test_failed_objects_are_not_memoized() {
    let FieldValue::Object(instance) = FieldValue::object(User { name: "Ada" }) else {
        unreachable!()
    };
    let schema = SchemaBuilder::new()
        .query_type("Query")
        .add_type(ObjectDef::new("Query").with_field(
            FieldDef::new("users", "[User]").with_resolver(FieldResolver::accessor(move |_| {
                Ok(FieldValue::list([instance.clone(), instance.clone()]))
            })),
        ))
        .add_type(ObjectDef::new("User").with_field(FieldDef::new("name", "String").with_resolver(
            FieldResolver::accessor(|_| Err(ResolverError::message("name hidden"))),
        )))
        .build()
        .unwrap();
    let response = run(&Executor::new(schema), "{ users { name } }").await;

    assert_eq!(data(&response), json!({"users": [{"name": null}, {"name": null}]}));
    let paths: Vec<_> = response
        .errors
        .unwrap()
        .iter()
        .map(|e| serde_json::to_value(&e.path).unwrap())
        .collect();
    assert_eq!(paths, [json!(["users", 0, "name"]), json!(["users", 1, "name"])]);
}

fn record_schema() -> Schema {
    SchemaBuilder::new()
        .query_type("Query")
        .add_type(ObjectDef::new("Query").with_field(
            FieldDef::new("rec", "Rec").with_resolver(FieldResolver::accessor(|_| {
                Ok(json!({"a": 1, "b": 2, "inner": {"x": 1, "y": 2}}).into())
            })),
        ))
        .add_type(
            ObjectDef::new("Rec")
                .with_field(FieldDef::new("a", "Int"))
                .with_field(FieldDef::new("b", "Int"))
                .with_field(FieldDef::new("inner", "Point")),
        )
        .add_type(
            ObjectDef::new("Point")
                .with_field(FieldDef::new("x", "Int"))
                .with_field(FieldDef::new("y", "Int")),
        )
        .build()
        .expect("schema builds")
}

/// Test that same-named selections from fragments merge their sub-selections.
#[tokio::test]
async fn test_field_merging_across_fragments() {
    let executor = Executor::new(record_schema());
    let response = run(
        &executor,
        "{ rec { a inner { x } } ... on Query { rec { b inner { y } } } }",
    )
    .await;

    assert!(!response.has_errors(), "{:?}", response.errors);
    insta::assert_json_snapshot!(response.data, @r###"
    {
      "rec": {
        "a": 1,
        "inner": {
          "x": 1,
          "y": 2
        },
        "b": 2
      }
    }
    "###);
}

/// Test that argument failures carry a user-input error code.
#[tokio::test]
async fn test_argument_errors_carry_code() {
    let executor = Executor::new(pets_schema());
    let response = run(&executor, "{ greet(name: 4) }").await;

    assert_eq!(data(&response), json!({"greet": null}));
    let errors = response.errors.unwrap();
    assert_eq!(
        errors[0].message,
        "Argument \"name\" has invalid value: String cannot represent value: 4"
    );
    let code = errors[0].extensions.as_ref().and_then(|ext| ext.get("code"));
    assert_eq!(code, Some(&json!("BAD_USER_INPUT")));
}
