//! Shared fixtures: sample leaf images and an in-process remote endpoint

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Write a small solid-colour PNG and return its path
pub fn write_leaf(dir: &Path, name: &str, rgb: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    image::RgbImage::from_pixel(16, 12, image::Rgb(rgb))
        .save(&path)
        .expect("write test image");
    path
}

#[derive(Clone)]
struct EndpointState {
    status: StatusCode,
    reply: Value,
    received: Arc<Mutex<Vec<Value>>>,
}

/// Remote classifier stand-in that answers every POST with a fixed reply
pub struct MockEndpoint {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockEndpoint {
    pub async fn start(status: u16, reply: Value) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = EndpointState {
            status: StatusCode::from_u16(status).expect("valid status"),
            reply,
            received: received.clone(),
        };
        let app = Router::new()
            .route("/workflow", post(classify_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock endpoint");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            url: format!("http://{}/workflow", addr),
            received,
        }
    }

    /// Request bodies seen so far
    pub fn requests(&self) -> Vec<Value> {
        self.received.lock().expect("lock").clone()
    }
}

async fn classify_handler(
    State(state): State<EndpointState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.received.lock().expect("lock").push(body);
    (state.status, Json(state.reply.clone()))
}
