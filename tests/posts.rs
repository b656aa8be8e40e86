//! Post listing, reading, creation, update, and deletion.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Listing & filters
// ===========================================================================

#[tokio::test]
async fn list_filters_by_city_and_price_band() {
    let app = app().await;
    let user = app.create_user("list_band").await;

    app.create_post_for_user(user.id, "Berlin", 900).await;
    let mid = app.create_post_for_user(user.id, "Berlin", 1500).await;
    app.create_post_for_user(user.id, "Berlin", 2500).await;

    let resp = app
        .get("/api/posts?city=Berlin&minPrice=1000&maxPrice=2000", None)
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"].as_str().unwrap(), mid.to_string());
    assert_eq!(items[0]["price"].as_i64().unwrap(), 1500);
}

#[tokio::test]
async fn list_price_bounds_are_inclusive() {
    let app = app().await;
    let user = app.create_user("list_incl").await;

    let low = app.create_post_for_user(user.id, "Inclusiveville", 1000).await;
    let high = app.create_post_for_user(user.id, "Inclusiveville", 2000).await;

    let resp = app
        .get(
            "/api/posts?city=Inclusiveville&minPrice=1000&maxPrice=2000",
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&low.to_string().as_str()));
    assert!(ids.contains(&high.to_string().as_str()));
}

#[tokio::test]
async fn list_filters_by_type_property_and_bedroom() {
    let app = app().await;
    let user = app.create_user("list_dims").await;

    let wanted = app
        .insert_post(user.id, "Dimtown", 1000, "buy", "house", 3)
        .await;
    app.insert_post(user.id, "Dimtown", 1000, "rent", "house", 3)
        .await;
    app.insert_post(user.id, "Dimtown", 1000, "buy", "apartment", 3)
        .await;
    app.insert_post(user.id, "Dimtown", 1000, "buy", "house", 2)
        .await;

    let resp = app
        .get(
            "/api/posts?city=Dimtown&type=buy&property=house&bedroom=3",
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"].as_str().unwrap(), wanted.to_string());
}

#[tokio::test]
async fn list_malformed_numeric_filter_is_bad_request() {
    let app = app().await;

    let resp = app.get("/api/posts?minPrice=abc", None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid minPrice");

    let resp = app.get("/api/posts?bedroom=two", None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid bedroom");
}

#[tokio::test]
async fn list_unknown_enum_filter_is_bad_request() {
    let app = app().await;

    let resp = app.get("/api/posts?type=lease", None).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "invalid type");
}

#[tokio::test]
async fn list_empty_filter_values_constrain_nothing() {
    let app = app().await;
    let user = app.create_user("list_empty").await;
    app.create_post_for_user(user.id, "Emptyfield", 800).await;

    let resp = app
        .get("/api/posts?city=Emptyfield&type=&minPrice=&bedroom=", None)
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json().as_array().unwrap().len(), 1);
}

// ===========================================================================
// Get
// ===========================================================================

#[tokio::test]
async fn get_nonexistent_post_not_found() {
    let app = app().await;

    let resp = app
        .get(&format!("/api/posts/{}", Uuid::new_v4()), None)
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "post not found");
}

#[tokio::test]
async fn get_post_embeds_detail_and_owner() {
    let app = app().await;
    let user = app.create_user("get_embed").await;
    let post_id = app.create_post_for_user(user.id, "Embedville", 1200).await;

    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"].as_str().unwrap(), post_id.to_string());
    assert_eq!(body["detail"]["description"].as_str().unwrap(), "test description");
    assert_eq!(body["owner"]["username"].as_str().unwrap(), user.username);
    assert_eq!(body["is_saved"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn get_post_invalid_token_degrades_to_anonymous() {
    let app = app().await;
    let user = app.create_user("get_degrade").await;
    let post_id = app.create_post_for_user(user.id, "Degradeton", 1200).await;
    app.save_post(user.id, post_id).await;

    let anonymous = app.get(&format!("/api/posts/{}", post_id), None).await;
    let garbled = app
        .get(&format!("/api/posts/{}", post_id), Some("not-a-token"))
        .await;

    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(garbled.status, StatusCode::OK);
    assert_eq!(anonymous.json()["is_saved"].as_bool().unwrap(), false);
    assert_eq!(garbled.json()["is_saved"].as_bool().unwrap(), false);
}

#[tokio::test]
async fn get_post_saved_flag_tracks_requester() {
    let app = app().await;
    let owner = app.create_user("get_saved_owner").await;
    let saver = app.create_user("get_saved_saver").await;
    let other = app.create_user("get_saved_other").await;
    let post_id = app.create_post_for_user(owner.id, "Savetown", 1200).await;
    app.save_post(saver.id, post_id).await;

    let saved = app
        .get(&format!("/api/posts/{}", post_id), Some(&saver.token))
        .await;
    let unsaved = app
        .get(&format!("/api/posts/{}", post_id), Some(&other.token))
        .await;

    assert_eq!(saved.json()["is_saved"].as_bool().unwrap(), true);
    assert_eq!(unsaved.json()["is_saved"].as_bool().unwrap(), false);
}

// ===========================================================================
// Add
// ===========================================================================

fn sample_post_body() -> serde_json::Value {
    json!({
        "postData": {
            "title": "Sunny flat",
            "price": 3000,
            "images": ["https://example.com/1.jpg"],
            "address": "5 Rue de Test",
            "city": "Paris",
            "bedroom": 2,
            "bathroom": 1,
            "type": "rent",
            "property": "apartment"
        },
        "postDetail": {
            "description": "Bright two-bedroom near the park",
            "utilities": "owner",
            "size": 64
        }
    })
}

#[tokio::test]
async fn add_then_get_round_trip() {
    let app = app().await;
    let user = app.create_user("add_roundtrip").await;

    let resp = app
        .post_json("/api/posts", sample_post_body(), Some(&user.token))
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let created = resp.json();
    assert_eq!(created["owner_id"].as_str().unwrap(), user.id.to_string());
    let post_id = created["id"].as_str().unwrap().to_string();

    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["title"].as_str().unwrap(), "Sunny flat");
    assert_eq!(body["price"].as_i64().unwrap(), 3000);
    assert_eq!(body["city"].as_str().unwrap(), "Paris");
    assert_eq!(body["type"].as_str().unwrap(), "rent");
    assert_eq!(body["property"].as_str().unwrap(), "apartment");
    assert_eq!(
        body["detail"]["description"].as_str().unwrap(),
        "Bright two-bedroom near the park"
    );
    assert_eq!(body["detail"]["size"].as_i64().unwrap(), 64);
}

#[tokio::test]
async fn add_post_requires_auth() {
    let app = app().await;

    let resp = app.post_json("/api/posts", sample_post_body(), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "missing credential");
}

#[tokio::test]
async fn add_post_negative_price_is_bad_request() {
    let app = app().await;
    let user = app.create_user("add_negative").await;

    let mut body = sample_post_body();
    body["postData"]["price"] = json!(-1);

    let resp = app.post_json("/api/posts", body, Some(&user.token)).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Update
// ===========================================================================

#[tokio::test]
async fn update_post_merges_supplied_fields() {
    let app = app().await;
    let user = app.create_user("update_merge").await;
    let post_id = app.create_post_for_user(user.id, "Mergeburg", 1000).await;

    let resp = app
        .put_json(
            &format!("/api/posts/{}", post_id),
            json!({
                "postData": { "price": 1200 },
                "postDetail": { "description": "refreshed description" }
            }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["price"].as_i64().unwrap(), 1200);
    // Untouched fields keep their stored values.
    assert_eq!(body["city"].as_str().unwrap(), "Mergeburg");

    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(
        resp.json()["detail"]["description"].as_str().unwrap(),
        "refreshed description"
    );
}

#[tokio::test]
async fn update_post_wrong_user_forbidden() {
    let app = app().await;
    let owner = app.create_user("update_owner").await;
    let intruder = app.create_user("update_intruder").await;
    let post_id = app.create_post_for_user(owner.id, "Guardville", 1000).await;

    let resp = app
        .put_json(
            &format!("/api/posts/{}", post_id),
            json!({ "postData": { "price": 1 } }),
            Some(&intruder.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(resp.json()["price"].as_i64().unwrap(), 1000);
}

#[tokio::test]
async fn update_racing_delete_is_never_an_error() {
    let app = app().await;
    let user = app.create_user("update_race").await;
    let post_id = app.create_post_for_user(user.id, "Racetown", 1000).await;

    let path = format!("/api/posts/{}", post_id);
    let update = app.put_json(
        &path,
        json!({ "postData": { "price": 1100 } }),
        Some(&user.token),
    );
    let delete = app.delete(&path, Some(&user.token));
    let (update_resp, delete_resp) = tokio::join!(update, delete);

    // Whichever side loses the race observes the post as gone, not a 500.
    assert!(
        update_resp.status == StatusCode::OK || update_resp.status == StatusCode::NOT_FOUND,
        "unexpected update status: {}",
        update_resp.status
    );
    assert!(
        delete_resp.status == StatusCode::OK || delete_resp.status == StatusCode::NOT_FOUND,
        "unexpected delete status: {}",
        delete_resp.status
    );
}

#[tokio::test]
async fn update_nonexistent_post_not_found() {
    let app = app().await;
    let user = app.create_user("update_missing").await;

    let resp = app
        .put_json(
            &format!("/api/posts/{}", Uuid::new_v4()),
            json!({ "postData": { "price": 1 } }),
            Some(&user.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Delete
// ===========================================================================

#[tokio::test]
async fn delete_by_non_owner_forbidden_then_owner_succeeds() {
    let app = app().await;
    let owner = app.create_user("delete_owner").await;
    let intruder = app.create_user("delete_intruder").await;

    let resp = app
        .post_json("/api/posts", sample_post_body(), Some(&owner.token))
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let post_id = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app
        .delete(&format!("/api/posts/{}", post_id), Some(&intruder.token))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "not authorized to delete");

    // Still retrievable after the forbidden attempt.
    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .delete(&format!("/api/posts/{}", post_id), Some(&owner.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_cascades_detail_row() {
    let app = app().await;
    let user = app.create_user("delete_cascade").await;
    let post_id = app.create_post_for_user(user.id, "Cascadia", 1000).await;

    let resp = app
        .delete(&format!("/api/posts/{}", post_id), Some(&user.token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let detail_count: i64 =
        sqlx::query_scalar("SELECT count(*) FROM post_details WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(detail_count, 0);
}

#[tokio::test]
async fn delete_nonexistent_post_not_found() {
    let app = app().await;
    let user = app.create_user("delete_missing").await;

    let resp = app
        .delete(&format!("/api/posts/{}", Uuid::new_v4()), Some(&user.token))
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_requires_auth() {
    let app = app().await;
    let user = app.create_user("delete_noauth").await;
    let post_id = app.create_post_for_user(user.id, "Lockville", 1000).await;

    let resp = app.delete(&format!("/api/posts/{}", post_id), None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}
