//! Synchronous handler adapter, end to end.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;

use http::{Method, Request, StatusCode};

use httpmetrics_core::metrics::{HttpProperties, HttpReqProperties};
use httpmetrics_core::middleware::{
    Config, CustomLabels, Flusher, Handler, Middleware, ResponseBuffer, ResponseWriter,
};

use common::RecordingRecorder;

fn post(path: &str) -> Request<()> {
    Request::builder()
        .method(Method::POST)
        .uri(path)
        .body(())
        .unwrap()
}

fn accepted(w: &mut dyn ResponseWriter, _: &Request<()>) {
    w.write_header(StatusCode::ACCEPTED);
    w.write(b"test1").unwrap();
}

#[test]
fn default_config_measures_the_exchange() {
    let rec = Arc::new(RecordingRecorder::default());
    let m = Middleware::new(Config {
        recorder: rec.clone(),
        ..Config::default()
    });
    let h = Handler::new("", m, accepted);

    let mut buf = ResponseBuffer::new();
    h.serve(&mut buf, &post("/test"));

    let want = HttpReqProperties {
        service: String::new(),
        id: "/test".into(),
        method: "POST".into(),
        code: "202".into(),
        custom_labels: vec![],
    };
    assert_eq!(rec.durations(), vec![want.clone()]);
    assert_eq!(rec.sizes(), vec![(want, 5)]);

    let inflight_props = HttpProperties {
        service: String::new(),
        id: "/test".into(),
        custom_labels: vec![],
    };
    assert_eq!(
        rec.inflight(),
        vec![(inflight_props.clone(), 1), (inflight_props, -1)]
    );

    // The client still gets exactly what the handler wrote.
    let resp = buf.into_response();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    assert_eq!(resp.body().as_slice(), b"test1");
}

#[test]
fn grouped_server_error() {
    let rec = Arc::new(RecordingRecorder::default());
    let m = Middleware::new(Config {
        recorder: rec.clone(),
        grouped_status: true,
        ..Config::default()
    });
    let h = Handler::new("", m, |w: &mut dyn ResponseWriter, _: &Request<()>| {
        w.write_header(StatusCode::GATEWAY_TIMEOUT);
        w.write(b"test1").unwrap();
    });

    h.serve(&mut ResponseBuffer::new(), &post("/test"));

    assert_eq!(rec.durations()[0].code, "5xx");
    assert_eq!(rec.sizes()[0].0.code, "5xx");
}

#[test]
fn service_label_on_every_call() {
    let rec = Arc::new(RecordingRecorder::default());
    let m = Middleware::new(Config {
        recorder: rec.clone(),
        service: "svc1".into(),
        ..Config::default()
    });
    let h = Handler::new("", m, accepted);

    h.serve(&mut ResponseBuffer::new(), &post("/test"));

    assert!(rec.durations().iter().all(|p| p.service == "svc1"));
    assert!(rec.sizes().iter().all(|(p, _)| p.service == "svc1"));
    assert_eq!(rec.inflight().len(), 2);
    assert!(rec.inflight().iter().all(|(p, _)| p.service == "svc1"));
}

#[test]
fn implicit_status_is_ok() {
    let rec = Arc::new(RecordingRecorder::default());
    let m = Middleware::new(Config {
        recorder: rec.clone(),
        ..Config::default()
    });
    let h = Handler::new("root", m, |w: &mut dyn ResponseWriter, _: &Request<()>| {
        w.write("Я бэтмен".as_bytes()).unwrap();
    });

    h.serve(&mut ResponseBuffer::new(), &post("/whatever"));

    assert_eq!(rec.durations()[0].code, "200");
    assert_eq!(rec.durations()[0].id, "root");
    assert_eq!(rec.sizes()[0].1, 15);
}

#[test]
fn custom_labels_from_request_extensions() {
    let rec = Arc::new(RecordingRecorder::default());
    let m = Middleware::new(Config {
        recorder: rec.clone(),
        ..Config::default()
    });
    let h = Handler::new("tiered", m, accepted);

    let mut req = post("/test");
    req.extensions_mut()
        .insert(CustomLabels(vec!["premium".to_string()]));
    h.serve(&mut ResponseBuffer::new(), &req);

    assert_eq!(rec.durations()[0].custom_labels, vec!["premium".to_string()]);
    assert_eq!(rec.inflight()[0].0.custom_labels, vec!["premium".to_string()]);
}

#[test]
fn handler_flush_reaches_the_real_writer() {
    let h = Handler::new(
        "stream",
        Middleware::default(),
        |w: &mut dyn ResponseWriter, _: &Request<()>| {
            w.write(b"chunk").unwrap();
            w.as_flusher().unwrap().flush().unwrap();
        },
    );

    let mut buf = ResponseBuffer::new();
    h.serve(&mut buf, &post("/stream"));
    assert_eq!(buf.flushes(), 1);
    assert_eq!(buf.body(), b"chunk");
}
