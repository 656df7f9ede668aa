#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
    use actix_web::http::StatusCode;
    use actix_web::test::{call_service, init_service, read_body, TestRequest};
    use actix_web::App;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    use pulse_core::{crypto, Metric};

    use crate::http::{configure, HttpConfig};
    use crate::service::MetricsService;
    use crate::storage::{MemoryStorage, MemoryStorageConfig};

    fn memory_service() -> MetricsService {
        let config = MemoryStorageConfig {
            store_interval: Duration::ZERO,
            store_file: None,
            restore: false,
        };
        MetricsService::new(Arc::new(MemoryStorage::new(config).unwrap()))
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    macro_rules! app {
        ($service:expr, $cfg:expr) => {
            init_service(App::new().configure(configure($service, $cfg))).await
        };
    }

    #[actix_web::test]
    async fn plaintext_counter_accumulates_across_requests() {
        let app = app!(memory_service(), HttpConfig::default());

        for value in ["7", "5"] {
            let req = TestRequest::post()
                .uri(&format!("/update/counter/hits/{value}"))
                .to_request();
            let resp = call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let resp =
            call_service(&app, TestRequest::get().uri("/value/counter/hits").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_body(resp).await.as_ref(), b"12");
    }

    #[actix_web::test]
    async fn json_gauge_update_echoes_post_update_value() {
        let app = app!(memory_service(), HttpConfig::default());

        let req = TestRequest::post()
            .uri("/update/")
            .set_payload(r#"{"id":"t","type":"gauge","value":45.2}"#)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Metric = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(body, Metric::gauge("t", 45.2));
    }

    #[actix_web::test]
    async fn json_counter_update_returns_accumulated_delta() {
        let app = app!(memory_service(), HttpConfig::default());

        for _ in 0..2 {
            let req = TestRequest::post()
                .uri("/update/")
                .set_payload(r#"{"id":"c","type":"counter","delta":5}"#)
                .to_request();
            let resp = call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = TestRequest::post()
            .uri("/update/")
            .set_payload(r#"{"id":"c","type":"counter","delta":5}"#)
            .to_request();
        let body: Metric = serde_json::from_slice(&read_body(call_service(&app, req).await).await).unwrap();
        assert_eq!(body, Metric::counter("c", 15));
    }

    #[actix_web::test]
    async fn batch_applies_in_order_and_values_read_back() {
        let app = app!(memory_service(), HttpConfig::default());

        let batch = r#"[{"id":"g","type":"gauge","value":1.0},
                        {"id":"c","type":"counter","delta":3},
                        {"id":"c","type":"counter","delta":4}]"#;
        let resp = call_service(
            &app,
            TestRequest::post().uri("/updates/").set_payload(batch).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp =
            call_service(&app, TestRequest::get().uri("/value/counter/c").to_request()).await;
        assert_eq!(read_body(resp).await.as_ref(), b"7");

        let resp = call_service(&app, TestRequest::get().uri("/value/gauge/g").to_request()).await;
        assert_eq!(read_body(resp).await.as_ref(), b"1");
    }

    #[actix_web::test]
    async fn unknown_category_is_not_implemented() {
        let app = app!(memory_service(), HttpConfig::default());

        let resp =
            call_service(&app, TestRequest::post().uri("/update/bogus/x/1").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(read_body(resp).await.as_ref(), b"Metric type is not supported\n");

        let resp =
            call_service(&app, TestRequest::get().uri("/value/bogus/x").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[actix_web::test]
    async fn invalid_path_value_is_bad_request() {
        let app = app!(memory_service(), HttpConfig::default());

        let resp =
            call_service(&app, TestRequest::post().uri("/update/gauge/x/ax").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_body(resp).await.as_ref(), b"Invalid metric value\n");

        let resp = call_service(
            &app,
            TestRequest::post().uri("/update/counter/x/1.5").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_metric_is_not_found() {
        let app = app!(memory_service(), HttpConfig::default());

        let resp =
            call_service(&app, TestRequest::get().uri("/value/gauge/nope").to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn wrong_hash_is_rejected_and_right_hash_accepted() {
        let cfg = HttpConfig { key: Some("k".to_string()), ..HttpConfig::default() };
        let app = app!(memory_service(), cfg);

        let body = br#"[{"id":"c","type":"counter","delta":1}]"#.to_vec();

        let req = TestRequest::post()
            .uri("/updates/")
            .insert_header(("Hash", crypto::body_hash("wrong-key", &body)))
            .set_payload(body.clone())
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = TestRequest::post()
            .uri("/updates/")
            .insert_header(("Hash", crypto::body_hash("k", &body)))
            .set_payload(body)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn trusted_subnet_gates_update_routes() {
        let cfg = HttpConfig {
            trusted_subnet: Some("10.0.0.0/8".parse().unwrap()),
            ..HttpConfig::default()
        };
        let app = app!(memory_service(), cfg);

        let req = TestRequest::post()
            .uri("/update/counter/hits/1")
            .insert_header(("X-Real-IP", "192.168.1.1"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = TestRequest::post()
            .uri("/update/counter/hits/1")
            .insert_header(("X-Real-IP", "10.1.2.3"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn agent_framing_round_trips_through_the_full_chain() {
        // gzip + HMAC + RSA, exactly as the agent transmits.
        let private = Arc::new(rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap());
        let public = rsa::RsaPublicKey::from(private.as_ref());

        let service = memory_service();
        let cfg = HttpConfig {
            key: Some("secret".to_string()),
            private_key: Some(Arc::clone(&private)),
            trusted_subnet: None,
        };
        let app = app!(service.clone(), cfg);

        let batch = vec![Metric::gauge("Alloc", 1024.0), Metric::counter("PollCount", 3)];
        let compressed = gzip(&serde_json::to_vec(&batch).unwrap());
        let body = crypto::encrypt_blocks(&public, &compressed).unwrap();
        let hash = crypto::body_hash("secret", &body);

        let req = TestRequest::post()
            .uri("/updates/")
            .insert_header((CONTENT_ENCODING, "gzip"))
            .insert_header(("Hash", hash))
            .set_payload(body)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(service.gauge("Alloc").await.unwrap(), 1024.0);
        assert_eq!(service.counter("PollCount").await.unwrap(), 3);
    }

    #[actix_web::test]
    async fn value_json_fills_in_the_stored_value() {
        let app = app!(memory_service(), HttpConfig::default());

        let resp = call_service(
            &app,
            TestRequest::post().uri("/update/gauge/t/45.2").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = TestRequest::post()
            .uri("/value/")
            .set_payload(r#"{"id":"t","type":"gauge"}"#)
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: Metric = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(body, Metric::gauge("t", 45.2));
    }

    #[actix_web::test]
    async fn home_page_lists_metrics_and_compresses_for_gzip_clients() {
        let app = app!(memory_service(), HttpConfig::default());

        call_service(&app, TestRequest::post().uri("/update/gauge/Alloc/1.5").to_request()).await;
        call_service(&app, TestRequest::post().uri("/update/counter/hits/4").to_request()).await;

        let resp = call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = String::from_utf8(read_body(resp).await.to_vec()).unwrap();
        assert!(html.contains("Alloc"));
        assert!(html.contains("1.500"));
        assert!(html.contains("hits"));

        let req = TestRequest::get()
            .uri("/")
            .insert_header((ACCEPT_ENCODING, "gzip"))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.headers().get(CONTENT_ENCODING).unwrap(), "gzip");
    }

    #[actix_web::test]
    async fn ping_reports_backend_liveness() {
        let app = app!(memory_service(), HttpConfig::default());

        let resp = call_service(&app, TestRequest::get().uri("/ping").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn synchronous_snapshot_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics-db.json");

        let storage_config = MemoryStorageConfig {
            store_interval: Duration::ZERO,
            store_file: Some(path.clone()),
            restore: true,
        };

        {
            let service =
                MetricsService::new(Arc::new(MemoryStorage::new(storage_config.clone()).unwrap()));
            let app = app!(service, HttpConfig::default());

            let resp = call_service(
                &app,
                TestRequest::post().uri("/update/counter/hits/5").to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        // A new storage over the same file sees the counter.
        let service = MetricsService::new(Arc::new(MemoryStorage::new(storage_config).unwrap()));
        let app = app!(service, HttpConfig::default());

        let resp =
            call_service(&app, TestRequest::get().uri("/value/counter/hits").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_body(resp).await.as_ref(), b"5");
    }

    #[actix_web::test]
    async fn malformed_batch_is_bad_request() {
        let app = app!(memory_service(), HttpConfig::default());

        for payload in ["[]", "not json", r#"[{"id":"g","type":"gauge"}]"#] {
            let resp = call_service(
                &app,
                TestRequest::post().uri("/updates/").set_payload(payload).to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload: {payload}");
        }
    }
}
