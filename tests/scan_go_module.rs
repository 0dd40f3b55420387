use std::path::Path;

use annoscan::annotation::{AnnotationRecord, DecodeError, Record, Schema, Strategy};
use annoscan::provider::{Field, ProviderError};
use annoscan::{collect, Collector, Config, Error, GoProvider, Grammar};
use serde::Deserialize;
use tempfile::TempDir;

const MODEL: &str = r#"package model

// Order is a purchase
// @Entity(table=orders)
type Order struct {
	ID int
}

// Store keeps orders
// @Inject(name=store)
type Store struct{}

// Find looks up an order
// @Query(name=find)
func (s *Store) Find(id int) (*Order, error) {
	return nil, nil
}
"#;

const SERVICE: &str = r#"package service

import (
	"fmt"

	"example.com/shop/model"
)

// Handler serves orders
// @Route(method=GET,path=/orders)
type Handler struct {
	store *model.Store
}

// Foo title words
// @Bar(x=1,y=2)
func Foo(a int) (b string) {
	return fmt.Sprint(a)
}

// List returns orders
//
// Results are unsorted.
// @Route(method=GET,path=/orders/list)
// @Bar(x)
func (h *Handler) List() ([]model.Order, error) {
	return nil, nil
}

// @Route(method=POST,path=/orphan)

func helper() {}
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn shop() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module example.com/shop\n\ngo 1.22\n");
    write(dir.path(), "model/model.go", MODEL);
    write(dir.path(), "service/service.go", SERVICE);
    dir
}

fn config() -> Config {
    Config::builder()
        .root("example.com/shop/service")
        .packages(["example.com/shop"])
        .build()
        .unwrap()
}

fn names(index: &annoscan::QueryIndex) -> Vec<String> {
    index
        .iter()
        .map(|e| {
            e.func_name()
                .or(e.struct_name())
                .unwrap_or("<bare>")
                .to_string()
        })
        .collect()
}

// -- traversal and binding --

#[test]
fn scan_orders_dependencies_first() {
    let dir = shop();
    let provider = GoProvider::open(dir.path()).unwrap();
    let index = collect(provider, config()).unwrap();

    assert_eq!(
        names(&index),
        vec!["Order", "Store", "Find", "Handler", "Foo", "List", "<bare>"]
    );
    assert_eq!(index.types().len(), 3);
    assert_eq!(index.functions().len(), 1);
    assert_eq!(index.methods().len(), 2);
}

#[test]
fn scan_binds_function_signature() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let found = index.with_name_and_result_type("Bar", "string");
    assert_eq!(found.len(), 1);

    let foo = found[0];
    assert_eq!(foo.func_name(), Some("Foo"));
    assert_eq!(foo.header.title, "title words");
    assert_eq!(foo.parameters(), &[Field::new("a", "int")]);
    assert_eq!(foo.results(), &[Field::new("b", "string")]);
    assert_eq!(foo.module, "example.com/shop");
    assert_eq!(foo.path, "example.com/shop/service");
    assert_eq!(foo.package, "service");
    assert_eq!(foo.file, "service.go");
}

#[test]
fn scan_binds_methods_across_packages() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let find = index.with_name("Query")[0];
    assert!(find.is_method());
    assert_eq!(find.struct_name(), Some("Store"));
    assert_eq!(
        find.results(),
        &[
            Field::new("", "*example.com/shop/model.Order"),
            Field::new("", "error"),
        ]
    );

    let list = index.with_name_and_result_type("Route", "error");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].struct_name(), Some("Handler"));
    assert_eq!(list[0].results()[0].ty, "[]example.com/shop/model.Order");
}

#[test]
fn scan_drops_malformed_and_keeps_prose() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let list = index.iter().find(|e| e.func_name() == Some("List")).unwrap();
    assert_eq!(list.annotations.len(), 1);
    assert_eq!(list.annotations[0].name, "Route");
    assert_eq!(list.header.title, "returns orders");
    assert_eq!(list.header.description, "Results are unsorted.");
}

#[test]
fn scan_detached_block_is_bare() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let orphan = index.all().last().unwrap();
    assert!(orphan.is_bare());
    assert_eq!(orphan.annotations[0].value, "method=POST,path=/orphan");
    assert_eq!(orphan.header.title, "");
}

#[test]
fn scan_with_prefix_and_filters() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();
    assert_eq!(index.with_prefix("In").len(), 1);
    assert_eq!(index.with_name("Route").len(), 3);

    let filtered = Config::builder()
        .root("example.com/shop/service")
        .packages(["example.com/shop"])
        .filters(["Route"])
        .build()
        .unwrap();
    let index = collect(GoProvider::open(dir.path()).unwrap(), filtered).unwrap();
    assert_eq!(names(&index), vec!["Handler", "List", "<bare>"]);
}

#[test]
fn parallel_scan_matches_sequential() {
    let dir = shop();
    let provider = GoProvider::open(dir.path()).unwrap();
    let collector = Collector::new(provider, config()).unwrap();

    let sequential = collector.run().unwrap();
    let parallel = collector.run_parallel().unwrap();
    assert_eq!(parallel, sequential);
}

#[test]
fn scan_grouped_type_block() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module example.com/di\n");
    write(
        dir.path(),
        "di.go",
        "package di\n\ntype (\n\t// Svc the service\n\t// @Inject(name=svc)\n\tSvc struct{}\n\n\t// Repo the repo\n\t// @Inject(name=repo)\n\tRepo struct{}\n)\n\n// Top the top\n// @Inject(name=top)\ntype Top struct{}\n",
    );

    let config = Config::builder().root(".").build().unwrap();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config).unwrap();

    let injected: Vec<(Option<&str>, &str)> = index
        .with_name("Inject")
        .into_iter()
        .map(|e| (e.struct_name(), e.annotations[0].value.as_str()))
        .collect();
    assert_eq!(
        injected,
        vec![
            (Some("Svc"), "name=svc"),
            (Some("Repo"), "name=repo"),
            (Some("Top"), "name=top"),
        ]
    );
    assert_eq!(index.with_name("Inject")[1].header.title, "the repo");
}

// -- configuration and failures --

#[test]
fn config_file_drives_scan() {
    let dir = shop();
    write(
        dir.path(),
        "annoscan.toml",
        "roots = [\"example.com/shop/model\"]\nfilters = [\"Inject\"]\n",
    );

    let config = Config::load(dir.path().join("annoscan.toml")).unwrap();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config).unwrap();
    assert_eq!(names(&index), vec!["Store"]);
}

#[test]
fn import_outside_module_aborts_without_allow_list() {
    let dir = shop();
    write(
        dir.path(),
        "service/log.go",
        "package service\n\nimport \"github.com/acme/log\"\n\nvar _ = log.New\n",
    );

    let config = Config::builder()
        .root("example.com/shop/service")
        .build()
        .unwrap();
    let err = collect(GoProvider::open(dir.path()).unwrap(), config).unwrap_err();

    match err {
        Error::Resolution { package, source } => {
            assert_eq!(package, "github.com/acme/log");
            assert!(matches!(source, ProviderError::OutsideModule { .. }));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn sigil_grammar_scan() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "go.mod", "module example.com/api\n");
    write(
        dir.path(),
        "api.go",
        "package api\n\n// GetUser fetch a user\n// @A Path /users/{id}\n// @A Response 200 User the user\nfunc GetUser(id string) (User, error) {\n\treturn User{}, nil\n}\n\n// User is a user\ntype User struct{}\n",
    );

    let config = Config::builder()
        .root(".")
        .grammar(Grammar::sigil("@A"))
        .build()
        .unwrap();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config).unwrap();

    assert_eq!(index.len(), 1);
    let entry = &index.all()[0];
    assert_eq!(entry.func_name(), Some("GetUser"));
    assert_eq!(entry.path, "example.com/api");
    assert_eq!(entry.annotations[0].name, "path");
    assert_eq!(
        entry.annotations[1].fields(),
        vec!["200", "User", "the", "user"]
    );
    assert!(entry.has_result_type("example.com/api.User"));
}

// -- output and decoding --

#[test]
fn index_serializes_to_json() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let json = serde_json::to_value(&index).unwrap();
    let foo = json
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["funcName"] == "Foo")
        .unwrap();

    assert_eq!(foo["header"]["title"], "title words");
    assert_eq!(foo["package"], "service");
    assert_eq!(foo["parameters"][0]["type"], "int");
    assert_eq!(foo["annotations"][0]["value"], "x=1,y=2");
    assert!(foo.get("structName").is_none());
}

struct Route {
    method: String,
    path: String,
}

impl AnnotationRecord for Route {
    const STRATEGY: Strategy = Strategy::Keyed;

    fn schema() -> Schema {
        Schema::new(["method", "path"])
    }

    fn from_record(record: &Record) -> Result<Self, DecodeError> {
        Ok(Self {
            method: record.get("method").unwrap_or("GET").to_string(),
            path: record.get("path").unwrap_or_default().to_string(),
        })
    }
}

#[derive(Deserialize)]
struct Entity {
    table: String,
}

#[test]
fn annotations_decode_into_records() {
    let dir = shop();
    let index = collect(GoProvider::open(dir.path()).unwrap(), config()).unwrap();

    let routes: Vec<Route> = index
        .with_name("Route")
        .iter()
        .filter_map(|e| e.annotation("Route"))
        .map(|a| a.decode_as::<Route>().unwrap())
        .collect();
    let paths: Vec<(&str, &str)> = routes
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("GET", "/orders"),
            ("GET", "/orders/list"),
            ("POST", "/orphan"),
        ]
    );

    let entity: Entity = index.with_name("Entity")[0]
        .annotation("Entity")
        .unwrap()
        .decode(&Schema::new(["table"]), Strategy::Keyed)
        .unwrap()
        .deserialize()
        .unwrap();
    assert_eq!(entity.table, "orders");
}
