use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::TestStatus;
use crate::test_support;

const CSV_HEADER: &str =
    "question,points,negative_points,option_a,option_b,option_c,option_d,correct";

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis test instances"]
async fn import_appends_questions_and_export_round_trips_them() {
    let ctx = test_support::setup_test_context().await;
    let admin =
        test_support::insert_admin(ctx.state.db(), "admin@steno.test", "Admin", "admin-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let test =
        test_support::insert_test(ctx.state.db(), "Theory 1", TestStatus::Draft, 15, &admin.id)
            .await;
    test_support::insert_question(ctx.state.db(), &test.id, "Existing", 1.0, &["x", "y"], 0).await;

    let body = format!(
        "{CSV_HEADER}\n\
         \"Outline for 'and', written\",2,0,dot,dash,hook,,B\n\
         Vowel sign for 'a',1,0,heavy dot,light dot,,,a\n"
    );
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::text_request(
            Method::POST,
            &format!("/api/v1/admin/tests/{}/questions/import", test.id),
            Some(&token),
            "text/csv",
            body,
        ))
        .await
        .expect("import");
    let status = response.status();
    let imported = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {imported}");
    assert_eq!(imported["imported"], 2);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/admin/tests/{}/questions", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("list");
    let questions = test_support::read_json(response).await;
    let questions = questions.as_array().expect("question list");
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[1]["text"], "Outline for 'and', written");
    assert_eq!(questions[1]["order_index"], 1);
    assert_eq!(questions[1]["options"].as_array().map(Vec::len), Some(3));
    assert_eq!(questions[1]["options"][1]["is_correct"], true);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::GET,
            &format!("/api/v1/admin/tests/{}/questions/export", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("export");
    assert_eq!(response.status(), StatusCode::OK);
    let exported = test_support::read_text(response).await;
    assert!(exported.starts_with(CSV_HEADER), "export: {exported}");
    assert!(exported.contains("\"Outline for 'and', written\""));

    let response = ctx
        .app
        .oneshot(test_support::text_request(
            Method::POST,
            &format!("/api/v1/admin/tests/{}/questions/import", test.id),
            Some(&token),
            "text/csv",
            format!("{CSV_HEADER}\nBroken,1,0,a,b,,,D\n"),
        ))
        .await
        .expect("bad import");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    assert!(body["detail"].as_str().unwrap_or_default().starts_with("row 2"));
}

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis test instances"]
async fn question_update_replaces_options() {
    let ctx = test_support::setup_test_context().await;
    let admin =
        test_support::insert_admin(ctx.state.db(), "admin@steno.test", "Admin", "admin-pass").await;
    let token = test_support::bearer_token(&admin.id, ctx.state.settings());
    let test =
        test_support::insert_test(ctx.state.db(), "Theory 2", TestStatus::Draft, 15, &admin.id)
            .await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/admin/tests/{}/questions", test.id),
            Some(&token),
            Some(json!({
                "text": "Halving principle applies to",
                "points": 2,
                "options": [
                    { "label": "t and d", "is_correct": true },
                    { "label": "p and b" },
                ],
            })),
        ))
        .await
        .expect("create");
    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    let question_id = created["id"].as_str().expect("id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/admin/tests/{}/questions", test.id),
            Some(&token),
            Some(json!({
                "text": "Two correct",
                "points": 1,
                "options": [
                    { "label": "a", "is_correct": true },
                    { "label": "b", "is_correct": true },
                ],
            })),
        ))
        .await
        .expect("invalid create");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/admin/tests/{}/questions/{question_id}", test.id),
            Some(&token),
            Some(json!({
                "text": "Halving principle",
                "points": 3,
                "options": [
                    { "label": "light strokes" },
                    { "label": "t or d", "is_correct": true },
                    { "label": "curves" },
                ],
            })),
        ))
        .await
        .expect("update");
    let status = response.status();
    let updated = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["points"], 3.0);
    assert_eq!(updated["order_index"], 0);
    assert_eq!(updated["options"].as_array().map(Vec::len), Some(3));
    assert_eq!(updated["options"][1]["label"], "t or d");

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/admin/tests/{}/questions/{question_id}", test.id),
            Some(&token),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
