//! Route handlers: the index page and the analyze endpoint.

use super::protocol::AnalyzeRequest;
use super::{AppContext, ServiceError};
use crate::analysis::{self, AnalysisError};
use actix_web::http::header::ContentType;
use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::{error, info, warn};

type Result<T> = std::result::Result<T, ServiceError>;

/// Static page with the in-browser capture form. Opaque content; the
/// functional surface is `/analyze`.
#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(include_str!("../../static/index.html"))
}

/// Analyze one encoded image and return the derived attribute record.
///
/// The body is parsed by hand rather than through the `web::Json`
/// extractor: a missing `image` field or a malformed body is a
/// request-level failure and surfaces as a 500 carrying the parse message,
/// while failures inside the pipeline share the 400 bucket.
#[post("/analyze")]
pub async fn analyze(body: web::Bytes, state: web::Data<AppContext>) -> Result<impl Responder> {
    let request: AnalyzeRequest = serde_json::from_slice(&body).map_err(|e| {
        error!("error in analyze request: {e}");
        ServiceError::Internal(e.to_string())
    })?;

    info!("received image data of length: {}", request.image.len());

    match analysis::analyze_image(state.analyzer.as_ref(), &state.options, &request.image) {
        Ok(result) => {
            info!("analysis result: {result:?}");
            Ok(web::Json(result))
        }
        Err(err @ (AnalysisError::DecodeFailed | AnalysisError::NoFaceDetected)) => {
            warn!("no face detected or analysis failed");
            Err(err.into())
        }
        Err(err) => {
            error!("error in analyze request: {err}");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalyzeOptions, FaceAnalyzer, FaceAttributes};
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use base64::{engine::general_purpose, Engine as _};
    use image::DynamicImage;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::sync::Arc;

    /// Analyzer stub: one canned record, or a detection failure.
    struct StubAnalyzer(Option<FaceAttributes>);

    impl FaceAnalyzer for StubAnalyzer {
        fn analyze(
            &self,
            _frame: &DynamicImage,
            _options: &AnalyzeOptions,
        ) -> std::result::Result<Vec<FaceAttributes>, AnalysisError> {
            match &self.0 {
                Some(attrs) => Ok(vec![attrs.clone()]),
                None => Err(AnalysisError::NoFaceDetected),
            }
        }
    }

    fn face() -> FaceAttributes {
        FaceAttributes {
            age: 30,
            gender: "Man".into(),
            emotion: "neutral".into(),
            race: "white".into(),
        }
    }

    fn encoded_png() -> String {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(1, 1)
            .write_to(
                &mut Cursor::new(&mut bytes),
                image::ImageOutputFormat::Png,
            )
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            general_purpose::STANDARD.encode(bytes)
        )
    }

    macro_rules! test_app {
        ($stub:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppContext::new(
                        Arc::new($stub),
                        AnalyzeOptions::default(),
                    )))
                    .service(index)
                    .service(analyze),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn analyze_returns_corrected_record() {
        let app = test_app!(StubAnalyzer(Some(face())));
        let req = test::TestRequest::post()
            .uri("/analyze")
            .set_json(json!({ "image": encoded_png() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["age"], 25);
        assert_eq!(body["age_range"], "20-30");
        assert_eq!(body["gender"], "Man");
        assert_eq!(body["emotion"], "neutral");
        assert_eq!(body["race"], "white");
    }

    #[actix_web::test]
    async fn no_face_maps_to_400_with_fixed_body() {
        let app = test_app!(StubAnalyzer(None));
        let req = test::TestRequest::post()
            .uri("/analyze")
            .set_json(json!({ "image": encoded_png() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No face detected or analysis failed");
    }

    #[actix_web::test]
    async fn decode_failure_shares_the_400_bucket() {
        // analyzer would succeed, but the payload never reaches it
        let app = test_app!(StubAnalyzer(Some(face())));
        let req = test::TestRequest::post()
            .uri("/analyze")
            .set_json(json!({ "image": "data:image/png;base64,@@@" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No face detected or analysis failed");
    }

    #[actix_web::test]
    async fn missing_image_field_is_a_500() {
        let app = test_app!(StubAnalyzer(Some(face())));
        let req = test::TestRequest::post()
            .uri("/analyze")
            .set_json(json!({ "picture": "nope" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("An error occurred: "));
        assert!(message.contains("image"), "message should name the field");
    }

    #[actix_web::test]
    async fn malformed_body_is_a_500() {
        let app = test_app!(StubAnalyzer(Some(face())));
        let req = test::TestRequest::post()
            .uri("/analyze")
            .insert_header(ContentType::json())
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("An error occurred: "));
    }

    #[actix_web::test]
    async fn index_serves_the_capture_page() {
        let app = test_app!(StubAnalyzer(Some(face())));
        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = test::read_body(resp).await;
        assert!(std::str::from_utf8(&body).unwrap().contains("<html"));
    }
}
