mod common;

use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    response::IntoResponse,
    Extension,
};
use byrdie::{
    shape, Action, Api, AppError, CurrentUser, MemoryStore, ResponseSchema, RouteOptions,
    SchemaActions, SchemaDescriptor, SchemaInstance, ScalarKind, TemplateContext, View, ViewOutput, ViewRequest,
    ViewResult,
};
use common::*;
use serde_json::{json, Value};

async fn hello(_req: ViewRequest) -> ViewResult {
    Ok(TemplateContext::new().insert("name", "World").into())
}

async fn own_layout(_req: ViewRequest) -> ViewResult {
    Ok(TemplateContext::new().into())
}

async fn untemplated(_req: ViewRequest) -> ViewResult {
    Ok(TemplateContext::new().into())
}

async fn people(_req: ViewRequest) -> ViewResult {
    Ok(json!([
        { "name": "Ada", "age": 36, "email": "ada@example.com" },
        { "name": "Alan", "age": "41" }
    ])
    .into())
}

async fn items(req: ViewRequest) -> ViewResult {
    Ok(req.state.store.all(&exposed_key()).await?.into())
}

async fn first_item(req: ViewRequest) -> ViewResult {
    let record = req
        .state
        .store
        .get(&exposed_key(), 1)
        .await?
        .ok_or_else(|| AppError::NotFound("no item".into()))?;
    Ok(record.into())
}

async fn raw_text(_req: ViewRequest) -> ViewResult {
    Ok("plain words".into())
}

async fn ready_made(_req: ViewRequest) -> ViewResult {
    Ok((StatusCode::CREATED, "made").into_response().into())
}

async fn home(req: ViewRequest) -> ViewResult {
    let note = req
        .state
        .store
        .get(&note_key(), 1)
        .await?
        .ok_or_else(|| AppError::NotFound("no note".into()))?;
    Ok(TemplateContext::new().insert_record("note", note).into())
}

async fn greeting(_req: ViewRequest) -> ViewResult {
    Ok(json!({ "name": "Ada" }).into())
}

async fn bare_mapping(_req: ViewRequest) -> ViewResult {
    Ok(json!({ "name": "Ada" }).into())
}

async fn tagged(req: ViewRequest) -> ViewResult {
    let note = req
        .state
        .store
        .get(&note_key(), 1)
        .await?
        .ok_or_else(|| AppError::NotFound("no note".into()))?;
    Ok(TemplateContext::new().insert_record("note", note).into())
}

async fn tagged_without_record(_req: ViewRequest) -> ViewResult {
    Ok(TemplateContext::new().into())
}

async fn routes_page(_req: ViewRequest) -> ViewResult {
    Ok(TemplateContext::new().into())
}

async fn note_list(_req: ViewRequest) -> ViewResult {
    Ok(json!([]).into())
}

async fn publish(instance: SchemaInstance, _req: ViewRequest) -> ViewResult {
    Ok(instance.into())
}

async fn recent(_req: ViewRequest) -> ViewResult {
    Ok("recent".into())
}

fn person_schema() -> Arc<SchemaDescriptor> {
    Arc::new(
        SchemaDescriptor::new("PersonSchema")
            .field("name", ScalarKind::Str)
            .field("age", ScalarKind::Int),
    )
}

fn page_templates() -> byrdie::Templates {
    templates()
        .with("hello.html", "<p>Hello {{ name }}</p>")
        .with("own_layout.html", "{% extends \"base.html\" %}{% block content %}own{% endblock %}")
        .with("home.html", "<section><note instance=\"note\" /></section>")
        .with("routes_page.html", "{{ byrdie_api_routes|safe }}")
        .with("greeting.html", "<p>Hi {{ name }}</p>")
        .with("tagged.html", "{% component 'note' %}|{% component 'note:card' %}")
        .with("tagged_without_record.html", "{% component 'note' %}")
}

async fn app(store: Arc<MemoryStore>) -> axum::Router {
    let mut api = Api::new();
    api.route(View::new("hello", hello)).unwrap();
    api.route(View::new("own_layout", own_layout)).unwrap();
    api.route(View::new("untemplated", untemplated)).unwrap();
    api.route(View::new("people__list", people).returns(ResponseSchema::Many(person_schema())))
        .unwrap();
    api.route(View::new("items", items)).unwrap();
    api.route(View::new("first_item", first_item)).unwrap();
    api.route(View::new("raw_text", raw_text)).unwrap();
    api.route(View::new("ready_made", ready_made)).unwrap();
    api.route_with("/", View::new("home", home)).unwrap();
    api.route(View::new("routes_page", routes_page)).unwrap();
    api.route(View::new("greeting", greeting)).unwrap();
    api.route(View::new("bare_mapping", bare_mapping)).unwrap();
    api.route(View::new("tagged", tagged)).unwrap();
    api.route(View::new("tagged_without_record", tagged_without_record)).unwrap();
    api.route_with(RouteOptions::new().api(true), View::new("notes__list", note_list))
        .unwrap();
    api.route_with(
        RouteOptions::new().path("/members").is_authenticated(true),
        View::new("members", raw_text),
    )
    .unwrap();
    api.route_with(
        RouteOptions::new()
            .path("/staff")
            .is_authenticated(true)
            .has_permissions(|u| u.has_perm("tests.staff")),
        View::new("staff", raw_text),
    )
    .unwrap();

    let note_schema = SchemaDescriptor::from_model("NoteSchema", &note_model(), ["id", "content"]).unwrap();
    api.add_schema(
        SchemaActions::new(note_schema)
            .action(Action::instance("publish", publish))
            .action(Action::class_level("recent", recent)),
    )
    .unwrap();

    api.into_router(state_with(store, page_templates()))
}

async fn seeded() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    seed_exposed(&store, "A", 1).await;
    seed_exposed(&store, "B", 2).await;
    seed_note(&store, "Hello").await;
    store
}

#[tokio::test]
async fn mapping_renders_view_template_inside_base_layout() {
    let (status, body) = send(app(seeded().await).await, Method::GET, "/hello", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html><body><p>Hello World</p></body></html>");
}

#[tokio::test]
async fn json_object_without_schema_renders_view_template() {
    let store = seeded().await;
    let (status, body) = send(app(store.clone()).await, Method::GET, "/greeting", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html><body><p>Hi Ada</p></body></html>");

    let (status, body) = send(app(store).await, Method::GET, "/bare_mapping", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Template 'bare_mapping.html' not found for view 'bare_mapping'.");
}

#[tokio::test]
async fn component_template_tags_render_records_from_the_context() {
    let store = seeded().await;
    let (status, body) = send(app(store.clone()).await, Method::GET, "/tagged", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html><body><h1>Hello</h1>|<h2>Hello</h2></body></html>");

    let (status, body) = send(app(store).await, Method::GET, "/tagged_without_record", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Component instance 'note' not found in context.");
}

#[tokio::test]
async fn template_with_its_own_layout_is_not_wrapped_again() {
    let (_, body) = send(app(seeded().await).await, Method::GET, "/own_layout", "").await;
    assert_eq!(body, "<html><body>own</body></html>");
}

#[tokio::test]
async fn missing_view_template_is_not_found() {
    let (status, body) = send(app(seeded().await).await, Method::GET, "/untemplated", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Template 'untemplated.html' not found for view 'untemplated'.");
}

#[tokio::test]
async fn declared_list_schema_serializes_in_order() {
    let (status, body) = send(app(seeded().await).await, Method::GET, "/people/list", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([{ "name": "Ada", "age": 36 }, { "name": "Alan", "age": 41 }])
    );
    assert!(body.find("Ada").unwrap() < body.find("Alan").unwrap());
}

#[tokio::test]
async fn records_use_their_default_schema() {
    let store = seeded().await;
    let (_, body) = send(app(store.clone()).await, Method::GET, "/items", "").await;
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([{ "name": "A", "value": 1 }, { "name": "B", "value": 2 }])
    );

    let (_, body) = send(app(store).await, Method::GET, "/first_item", "").await;
    assert_eq!(body, r#"{"name":"A","value":1}"#);
}

#[tokio::test]
async fn plain_and_ready_outputs_pass_through() {
    let store = seeded().await;
    let (status, body) = send(app(store.clone()).await, Method::GET, "/raw_text", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "plain words");

    let (status, body) = send(app(store).await, Method::GET, "/ready_made", "").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, "made");
}

#[tokio::test]
async fn component_tags_in_view_templates_are_expanded() {
    let (status, body) = send(app(seeded().await).await, Method::GET, "/", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html><body><section><h1>Hello</h1></section></body></html>");
}

#[tokio::test]
async fn api_routes_are_published_to_templates() {
    let (_, body) = send(app(seeded().await).await, Method::GET, "/routes_page", "").await;
    assert!(
        body.contains(r#"<script>window.byrdie_routes = {"notes.list": "/api/notes/list"};</script>"#),
        "{}",
        body
    );
}

#[tokio::test]
async fn access_checks_run_before_the_view() {
    let store = seeded().await;
    let (status, _) = send(app(store.clone()).await, Method::GET, "/members", "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signed_in = app(store.clone())
        .await
        .layer(Extension(CurrentUser::authenticated("ada")));
    let (status, body) = send(signed_in.clone(), Method::GET, "/members", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "plain words");

    let (status, _) = send(signed_in, Method::GET, "/staff", "").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = app(store)
        .await
        .layer(Extension(CurrentUser::authenticated("ada").with_permission("tests.staff")));
    let (status, _) = send(staff, Method::GET, "/staff", "").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn instance_actions_load_the_record() {
    let store = seeded().await;
    let (status, body) = send(app(store.clone()).await, Method::POST, "/note/1/publish", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"id":1,"content":"Hello"}"#);

    let (status, body) = send(app(store.clone()).await, Method::POST, "/note/99/publish", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No tests.note matches the given query.");

    let (_, body) = send(app(store).await, Method::GET, "/note/recent", "").await;
    assert_eq!(body, "recent");
}

#[tokio::test]
async fn shape_without_a_schema_returns_raw_body() {
    let state = state(Arc::new(MemoryStore::new()));
    let response = shape(ViewOutput::Json(json!("just text")), None, "v", &state).unwrap();
    assert_eq!(body_text(response).await, "just text");
}

#[tokio::test]
async fn shape_rejects_output_that_does_not_fit_the_schema() {
    let state = state(Arc::new(MemoryStore::new()));
    let declared = ResponseSchema::One(person_schema());
    match shape(ViewOutput::Json(json!({ "name": "Ada" })), Some(&declared), "v", &state) {
        Err(err) => assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR),
        Ok(_) => panic!("missing field should not serialize"),
    }
}
