use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use futures::{StreamExt, TryStreamExt};
use log::{debug, error, info, warn};
use shared::{ErrorResponse, RootResponse};
use uuid::Uuid;

use crate::detector::{InferenceService, ServiceError};

/// Multipart field the front-end uploads the image under.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Missing file field")]
    MissingFile,
    #[error("Malformed upload: {0}")]
    Upload(String),
}

impl ResponseError for DetectError {
    fn status_code(&self) -> StatusCode {
        match self {
            DetectError::Service(ServiceError::InvalidImage(_)) => StatusCode::BAD_REQUEST,
            DetectError::Service(ServiceError::ModelUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DetectError::Service(ServiceError::InferenceFailed(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            DetectError::MissingFile | DetectError::Upload(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            DetectError::Service(err) => ErrorResponse {
                error: err.summary().to_string(),
                detail: err.detail().to_string(),
            },
            DetectError::MissingFile => ErrorResponse {
                error: "Missing file field".to_string(),
                detail: format!("expected a multipart field named {:?}", FILE_FIELD),
            },
            DetectError::Upload(detail) => ErrorResponse {
                error: "Malformed upload".to_string(),
                detail: detail.clone(),
            },
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(read_root)))
        .service(web::resource("/status").route(web::get().to(model_status)))
        .service(web::resource("/detect").route(web::post().to(detect)));
}

/// CORS policy restricted to the configured front-end origins.
pub fn cors(origins: &[String]) -> Cors {
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

async fn read_root() -> HttpResponse {
    HttpResponse::Ok().json(RootResponse {
        hello: "TruthChain AI".to_string(),
    })
}

async fn model_status(service: web::Data<InferenceService>) -> HttpResponse {
    HttpResponse::Ok().json(service.status())
}

async fn detect(
    service: web::Data<InferenceService>,
    mut payload: Multipart,
) -> Result<HttpResponse, DetectError> {
    let request_id = Uuid::new_v4();
    let limit = service.max_upload_bytes();
    let mut upload: Option<Vec<u8>> = None;

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| DetectError::Upload(e.to_string()))?
    {
        let is_file = field.name() == Some(FILE_FIELD);
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| DetectError::Upload(e.to_string()))?;
            if !is_file {
                continue;
            }
            if image_data.len() + data.len() > limit {
                warn!("[{}] Upload exceeds {} bytes", request_id, limit);
                return Err(ServiceError::InvalidImage(format!(
                    "Upload exceeds the {} byte limit",
                    limit
                ))
                .into());
            }
            image_data.extend_from_slice(&data);
        }
        if is_file && upload.is_none() {
            upload = Some(image_data);
        }
    }

    let image_data = upload.ok_or(DetectError::MissingFile)?;
    debug!("[{}] Received {} byte upload", request_id, image_data.len());

    match service.classify_image(image_data).await {
        Ok(verdict) => {
            info!(
                "[{}] {} (confidence {:.4})",
                request_id, verdict.label, verdict.confidence
            );
            Ok(HttpResponse::Ok().json(verdict))
        }
        Err(err) => {
            match &err {
                ServiceError::InvalidImage(_) => warn!("[{}] {}", request_id, err),
                _ => error!("[{}] {}", request_id, err),
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::testing::{png_for, StubLoader};
    use crate::detector::ModelHandle;
    use actix_web::http::header;
    use actix_web::{test, App};
    use shared::{ModelState, ModelStatus, Verdict};

    const BOUNDARY: &str = "----truthchain-test-boundary";

    fn multipart(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn detect_request(parts: &[(&str, &[u8])]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/detect")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart(parts))
    }

    fn app_data(loader: StubLoader) -> web::Data<InferenceService> {
        web::Data::new(InferenceService::new(ModelHandle::new(loader), 1024 * 1024))
    }

    #[actix_web::test]
    async fn root_reports_liveness() {
        let app = test::init_service(App::new().configure(configure_routes)).await;
        let body: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request())
                .await;
        assert_eq!(body, serde_json::json!({ "Hello": "TruthChain AI" }));
    }

    #[actix_web::test]
    async fn detect_returns_verdict_and_status_turns_ready() {
        let loader = StubLoader::new();
        let app = test::init_service(
            App::new()
                .app_data(app_data(loader.clone()))
                .configure(configure_routes),
        )
        .await;

        let status: ModelStatus = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;
        assert_eq!(status.state, ModelState::Unloaded);

        let png = png_for(12, true);
        let verdict: Verdict = test::call_and_read_body_json(
            &app,
            detect_request(&[("note", b"ignored"), ("file", &png)]).to_request(),
        )
        .await;
        assert!(verdict.is_fake);
        assert_eq!(verdict.label, "Deepfake");
        assert!((verdict.confidence - 0.12).abs() < 1e-6);

        let status: ModelStatus = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/status").to_request(),
        )
        .await;
        assert_eq!(status.state, ModelState::Ready);
        assert_eq!(status.model_id, "stub/detector");
        assert_eq!(loader.loads(), 1);
    }

    #[actix_web::test]
    async fn invalid_image_is_a_client_error_with_detail() {
        let app = test::init_service(
            App::new()
                .app_data(app_data(StubLoader::new()))
                .configure(configure_routes),
        )
        .await;

        let resp = test::call_service(
            &app,
            detect_request(&[("file", b"hello, this is a text file")]).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Invalid image file");
        assert!(!body.detail.is_empty());
    }

    #[actix_web::test]
    async fn missing_file_field_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(app_data(StubLoader::new()))
                .configure(configure_routes),
        )
        .await;

        let resp = test::call_service(
            &app,
            detect_request(&[("image", &png_for(4, true))]).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Missing file field");
    }

    #[actix_web::test]
    async fn load_failure_is_service_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(app_data(StubLoader::new().failing_first(1)))
                .configure(configure_routes),
        )
        .await;

        let png = png_for(4, true);
        let resp = test::call_service(&app, detect_request(&[("file", &png)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Model unavailable");

        let resp = test::call_service(&app, detect_request(&[("file", &png)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn inference_failure_is_server_error() {
        let app = test::init_service(
            App::new()
                .app_data(app_data(StubLoader::new().broken_model()))
                .configure(configure_routes),
        )
        .await;

        let png = png_for(4, true);
        let resp = test::call_service(&app, detect_request(&[("file", &png)]).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Inference failed");
    }

    #[actix_web::test]
    async fn cors_allows_listed_origins_only() {
        let origins = vec!["http://localhost:5173".to_string()];
        let app = test::init_service(
            App::new()
                .wrap(cors(&origins))
                .configure(configure_routes),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/")
                .insert_header((header::ORIGIN, "http://localhost:5173"))
                .to_request(),
        )
        .await;
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("http://localhost:5173")
        );

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/")
                .insert_header((header::ORIGIN, "https://evil.example"))
                .to_request(),
        )
        .await;
        assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
