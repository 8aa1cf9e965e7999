//! Integration tests for OpenAPI document assembly.

use rescast::{
    load_declarations_str, Info, Operation, Parameter, ResponseBody, Resource, Schema, Selection,
    TypeTag,
};
use serde_json::{json, Value};

fn product() -> Resource {
    Resource::builder("Product")
        .add("id", TypeTag::Integer)
        .add("name", TypeTag::Text)
        .build()
        .unwrap()
}

/// Products CRUD surface: list, show, create, update, delete.
fn products_api() -> Schema {
    let product = product();
    let draft = product.partial(&Selection::fields(["name"])).unwrap();

    Schema::new()
        .operation(
            Operation::get("/products")
                .action("index")
                .param(Parameter::new("page", TypeTag::Integer).optional().default_value(1))
                .param(Parameter::new("per_page", TypeTag::Integer).optional().default_value(20))
                .response(200, ResponseBody::many(&product)),
        )
        .operation(
            Operation::get("/products/{id}")
                .action("show")
                .response(200, &product),
        )
        .operation(
            Operation::post("/products")
                .action("create")
                .body(&draft)
                .response(200, &product),
        )
        .operation(
            Operation::patch("/products/{id}")
                .action("update")
                .body(&draft)
                .response(200, &product),
        )
        .operation(
            Operation::delete("/products/{id}")
                .action("destroy")
                .response(200, &product),
        )
}

fn product_schema() -> Value {
    json!({
        "title": "Product",
        "type": "object",
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" }
        },
        "additionalProperties": false,
        "required": ["id", "name"]
    })
}

fn id_parameter() -> Value {
    json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } })
}

// === Products API ===

mod products {
    use super::*;

    #[test]
    fn document_header() {
        let doc = products_api().to_openapi().unwrap();
        assert_eq!(doc["openapi"], json!("3.0.0"));
        assert_eq!(doc["info"], json!({ "title": "api", "version": "1.0.0" }));
        assert!(doc.get("components").is_none());
    }

    #[test]
    fn paths_group_methods() {
        let doc = products_api().to_openapi().unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert_eq!(
            paths.keys().collect::<Vec<_>>(),
            vec!["/products", "/products/{id}"]
        );
        assert_eq!(
            doc["paths"]["/products/{id}"]
                .as_object()
                .unwrap()
                .keys()
                .collect::<Vec<_>>(),
            vec!["get", "patch", "delete"]
        );
    }

    #[test]
    fn index_operation() {
        let doc = products_api().to_openapi().unwrap();
        assert_eq!(
            doc["paths"]["/products"]["get"],
            json!({
                "operationId": "index",
                "parameters": [
                    { "name": "page", "in": "query", "required": false, "schema": { "type": "integer", "default": 1 } },
                    { "name": "per_page", "in": "query", "required": false, "schema": { "type": "integer", "default": 20 } }
                ],
                "responses": {
                    "200": {
                        "description": "",
                        "content": {
                            "application/json": {
                                "schema": { "type": "array", "items": product_schema() }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn show_operation() {
        let doc = products_api().to_openapi().unwrap();
        let show = &doc["paths"]["/products/{id}"]["get"];
        assert_eq!(show["parameters"], json!([id_parameter()]));
        assert_eq!(
            show["responses"]["200"]["content"]["application/json"]["schema"],
            product_schema()
        );
    }

    #[test]
    fn create_and_update_bodies() {
        let doc = products_api().to_openapi().unwrap();
        let expected_body = json!({
            "content": {
                "application/json": {
                    "schema": {
                        "title": "Product",
                        "type": "object",
                        "properties": { "name": { "type": "string" } },
                        "additionalProperties": false,
                        "required": ["name"]
                    }
                }
            },
            "required": true
        });
        assert_eq!(doc["paths"]["/products"]["post"]["requestBody"], expected_body);
        assert_eq!(
            doc["paths"]["/products/{id}"]["patch"]["requestBody"],
            expected_body
        );
        assert_eq!(
            doc["paths"]["/products/{id}"]["patch"]["parameters"],
            json!([id_parameter()])
        );
    }

    #[test]
    fn declared_id_is_a_query_parameter() {
        let doc = Schema::new()
            .operation(
                Operation::delete("/products/{id}")
                    .param(Parameter::new("id", TypeTag::Integer))
                    .response(200, &product()),
            )
            .to_openapi()
            .unwrap();
        assert_eq!(
            doc["paths"]["/products/{id}"]["delete"]["parameters"],
            json!([
                { "name": "id", "in": "query", "required": true, "schema": { "type": "integer" } },
                id_parameter()
            ])
        );
    }

    #[test]
    fn delete_has_no_body() {
        let doc = products_api().to_openapi().unwrap();
        let delete = &doc["paths"]["/products/{id}"]["delete"];
        assert!(delete.get("requestBody").is_none());
        assert_eq!(delete["operationId"], json!("destroy"));
    }

    #[test]
    fn operations_by_action() {
        let api = products_api();
        assert_eq!(api.len(), 5);
        let update = api.operation_for("update").unwrap();
        assert_eq!(update.path(), "/products/{id}");
        assert_eq!(update.path_placeholders(), vec!["id"]);
        assert!(update.request_body().is_some());
    }

    #[test]
    fn document_is_stable() {
        let api = products_api();
        assert_eq!(api.to_openapi().unwrap(), api.to_openapi().unwrap());
    }
}

// === References and Components ===

mod components {
    use super::*;

    fn category_api(use_refs: bool) -> Schema {
        let link = rescast::ResourceLink::forward("Category");
        let category = Resource::builder("Category")
            .add("name", TypeTag::Text)
            .field(rescast::Field::new("parent", TypeTag::ResourceRef(link.clone())).nullable())
            .build()
            .unwrap();
        link.define(&category).unwrap();

        Schema::new()
            .with_info(Info::new("catalog", "2.0.0"))
            .use_refs(use_refs)
            .operation(Operation::get("/categories/{id}").returns(&category))
    }

    #[test]
    fn cycle_is_cut_with_component_ref() {
        let doc = category_api(false).to_openapi().unwrap();
        let schema =
            &doc["paths"]["/categories/{id}"]["get"]["responses"]["2XX"]["content"]["application/json"]["schema"];
        assert_eq!(schema["title"], json!("Category"));
        assert_eq!(
            schema["properties"]["parent"],
            json!({ "allOf": [{ "$ref": "#/components/schemas/Category" }], "nullable": true })
        );
        assert_eq!(
            doc["components"]["schemas"]["Category"]["properties"]["name"],
            json!({ "type": "string" })
        );
    }

    #[test]
    fn use_refs_references_everything() {
        let doc = category_api(true).to_openapi().unwrap();
        assert_eq!(
            doc["paths"]["/categories/{id}"]["get"]["responses"]["2XX"]["content"]["application/json"]["schema"],
            json!({ "$ref": "#/components/schemas/Category" })
        );
        assert_eq!(doc["info"]["title"], json!("catalog"));
        assert_eq!(
            doc["components"]["schemas"].as_object().unwrap().len(),
            1
        );
    }
}

// === Declaration Documents ===

mod declarations {
    use super::*;

    #[test]
    fn loaded_document_matches_built_schema() {
        let decl = load_declarations_str(
            r#"{
                "resources": {
                    "Product": { "fields": { "id": "integer", "name": "string" } }
                },
                "operations": [
                    {
                        "path": "/products", "method": "get", "action": "index",
                        "parameters": [
                            { "name": "page", "type": "integer", "required": false, "default": 1 },
                            { "name": "per_page", "type": "integer", "required": false, "default": 20 }
                        ],
                        "responses": { "200": ["Product"] }
                    },
                    { "path": "/products/{id}", "method": "get", "action": "show", "responses": { "200": "Product" } },
                    {
                        "path": "/products", "method": "post", "action": "create",
                        "body": { "resource": "Product", "partial": ["name"] },
                        "responses": { "200": "Product" }
                    },
                    {
                        "path": "/products/{id}", "method": "PATCH", "action": "update",
                        "body": { "resource": "Product", "partial": ["name"] },
                        "responses": { "200": "Product" }
                    },
                    { "path": "/products/{id}", "method": "delete", "action": "destroy", "responses": { "200": "Product" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            decl.schema().to_openapi().unwrap(),
            products_api().to_openapi().unwrap()
        );
    }
}
