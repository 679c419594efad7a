#[macro_use]
mod common;

use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::test::TestRequest;
use serde_json::{json, Value};

use common::{test_state, ADMIN_EMAIL};

fn names(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[actix_web::test]
async fn test_plant_mutations_require_admin() {
    let (state, _) = test_state();
    let app = app!(state);
    let user = token_for!(app, "fern", "fern@example.com");
    let plant = json!({ "name": "Aloe", "price": 5.0, "categories": ["Succulent"] });

    let (status, _) = call!(
        app,
        TestRequest::post().uri("/api/v1/plants").set_json(&plant)
    );
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/plants")
            .insert_header(bearer!(user))
            .set_json(&plant)
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");

    let (status, _) = call!(
        app,
        TestRequest::delete()
            .uri("/api/v1/plants/anything")
            .insert_header(bearer!(user))
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_admin_check_precedes_body_parsing() {
    let (state, _) = test_state();
    let app = app!(state);
    let user = token_for!(app, "fern", "fern@example.com");
    let malformed = || {
        TestRequest::post()
            .uri("/api/v1/plants")
            .insert_header(ContentType::json())
            .set_payload("{\"name\": ")
    };

    let (status, body) = call!(app, malformed().insert_header(bearer!(user)));
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin access required");

    let (status, body) = call!(app, malformed());
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized request");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri("/api/v1/plants/anything")
            .insert_header(ContentType::json())
            .insert_header(bearer!(user))
            .set_payload("not json")
    );
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_create_plant() {
    let (state, _) = test_state();
    let app = app!(state);
    let admin = token_for!(app, "boss", ADMIN_EMAIL);

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/plants")
            .insert_header(bearer!(admin))
            .set_json(json!({
                "name": "  Snake Plant ",
                "price": 12.5,
                "categories": "Air Purifying",
                "description": "Hard to kill",
                "imageUrl": "/uploads/snake.png",
            }))
    );
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Plant created successfully");
    let data = &body["data"];
    assert_eq!(data["name"], "Snake Plant");
    assert_eq!(data["price"], 12.5);
    assert_eq!(data["categories"], json!(["Air Purifying"]));
    assert_eq!(data["inStock"], true);
    assert_eq!(data["imageUrl"], "/uploads/snake.png");

    let id = data["_id"].as_str().unwrap();
    let (status, body) = call!(app, TestRequest::get().uri(&format!("/api/v1/plants/{id}")));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Plant fetched successfully");
    assert_eq!(body["data"]["description"], "Hard to kill");
}

#[actix_web::test]
async fn test_create_plant_validation() {
    let (state, _) = test_state();
    let app = app!(state);
    let admin = token_for!(app, "boss", ADMIN_EMAIL);

    let cases = [
        (json!({ "price": 3, "categories": ["Indoor"] }), "Name and Price are required"),
        (json!({ "name": "  ", "price": 3, "categories": ["Indoor"] }), "Name and Price are required"),
        (json!({ "name": "Fern", "categories": ["Indoor"] }), "Name and Price are required"),
        (json!({ "name": "Fern", "price": -1, "categories": ["Indoor"] }), "Price cannot be negative"),
        (json!({ "name": "Fern", "price": 3 }), "At least one category is required"),
        (json!({ "name": "Fern", "price": 3, "categories": [] }), "At least one category is required"),
    ];
    for (payload, message) in cases {
        let (status, body) = call!(
            app,
            TestRequest::post()
                .uri("/api/v1/plants")
                .insert_header(bearer!(admin))
                .set_json(&payload)
        );
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert_eq!(body["message"], message, "{payload}");
    }

    let (status, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/plants")
            .insert_header(bearer!(admin))
            .set_json(json!({ "name": "Fern", "price": 3, "categories": ["Cactus"] }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn test_list_plants_with_filters() {
    let (state, _) = test_state();
    let app = app!(state);
    let admin = token_for!(app, "boss", ADMIN_EMAIL);

    let plants = [
        json!({ "name": "Peace Lily", "price": 9, "categories": ["Indoor", "Air Purifying"] }),
        json!({ "name": "Rose", "price": 4, "categories": ["Outdoor", "Flowering"], "inStock": false }),
        json!({ "name": "Tulsi", "price": 2, "categories": ["Medicinal", "Outdoor"] }),
    ];
    for plant in &plants {
        let (status, _) = call!(
            app,
            TestRequest::post()
                .uri("/api/v1/plants")
                .insert_header(bearer!(admin))
                .set_json(plant)
        );
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call!(app, TestRequest::get().uri("/api/v1/plants"));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Plants fetched successfully");
    assert_eq!(names(&body), ["Peace Lily", "Rose", "Tulsi"]);

    let (_, body) = call!(app, TestRequest::get().uri("/api/v1/plants?category=outDOOR"));
    assert_eq!(names(&body), ["Rose", "Tulsi"]);

    let (_, body) = call!(app, TestRequest::get().uri("/api/v1/plants?category=purif"));
    assert_eq!(names(&body), ["Peace Lily"]);

    let (_, body) = call!(app, TestRequest::get().uri("/api/v1/plants?inStock=true"));
    assert_eq!(names(&body), ["Peace Lily", "Tulsi"]);

    let (_, body) = call!(app, TestRequest::get().uri("/api/v1/plants?inStock=no"));
    assert_eq!(names(&body), ["Rose"]);

    let (_, body) = call!(
        app,
        TestRequest::get().uri("/api/v1/plants?category=outdoor&inStock=true")
    );
    assert_eq!(names(&body), ["Tulsi"]);

    let (_, body) = call!(app, TestRequest::get().uri("/api/v1/plants?category=cactus"));
    assert_eq!(names(&body), Vec::<String>::new());
}

#[actix_web::test]
async fn test_public_routes_ignore_stale_tokens() {
    let (state, _) = test_state();
    let app = app!(state);

    let (status, _) = call!(
        app,
        TestRequest::get()
            .uri("/api/v1/plants")
            .insert_header(bearer!("expired-or-garbage"))
    );
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn test_update_and_delete_plant() {
    let (state, _) = test_state();
    let app = app!(state);
    let admin = token_for!(app, "boss", ADMIN_EMAIL);

    let (_, body) = call!(
        app,
        TestRequest::post()
            .uri("/api/v1/plants")
            .insert_header(bearer!(admin))
            .set_json(json!({
                "name": "Jade",
                "price": 7,
                "categories": ["Succulent"],
                "description": "Lucky",
            }))
    );
    let id = body["data"]["_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/plants/{id}");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&uri)
            .insert_header(bearer!(admin))
            .set_json(json!({ "price": 8.25, "categories": "Indoor", "inStock": false }))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Plant updated successfully");
    assert_eq!(body["data"]["name"], "Jade");
    assert_eq!(body["data"]["price"], 8.25);
    assert_eq!(body["data"]["categories"], json!(["Indoor"]));
    assert_eq!(body["data"]["inStock"], false);
    assert_eq!(body["data"]["description"], "Lucky");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&uri)
            .insert_header(bearer!(admin))
            .set_json(json!({ "name": " " }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Plant name is required");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri(&uri)
            .insert_header(bearer!(admin))
            .set_json(json!({ "price": -2 }))
    );
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Price cannot be negative");

    let (status, body) = call!(
        app,
        TestRequest::put()
            .uri("/api/v1/plants/missing")
            .insert_header(bearer!(admin))
            .set_json(json!({ "price": 1 }))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Plant not found");

    let (status, body) = call!(
        app,
        TestRequest::delete().uri(&uri).insert_header(bearer!(admin))
    );
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Plant deleted successfully");

    let (status, body) = call!(
        app,
        TestRequest::delete().uri(&uri).insert_header(bearer!(admin))
    );
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Plant not found");

    let (status, _) = call!(app, TestRequest::get().uri(&uri));
    assert_eq!(status, StatusCode::NOT_FOUND);
}
