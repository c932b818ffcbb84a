use actix_web::{http::header, web, HttpResponse};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::state::{AppState, ServerEvent};

/// Mounted inside the admin scope, which already enforces admin credentials.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/events").route(web::get().to(stream_events)));
}

/// Server-sent events feed for the admin dashboard. Lagging receivers skip
/// the events they missed instead of closing the stream.
async fn stream_events(state: web::Data<AppState>) -> HttpResponse {
    let rx = state.events.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => Some(Ok::<web::Bytes, actix_web::Error>(event_to_bytes(&event))),
        Err(_) => None,
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

pub(crate) fn event_to_bytes(event: &ServerEvent) -> web::Bytes {
    let payload = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: {}\ndata: {}\n\n", event.kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_framed_for_sse() {
        let event = ServerEvent {
            kind: "payment_verified".to_string(),
            appointment_id: Some("a1".to_string()),
            payment_id: Some("p1".to_string()),
            user_id: None,
            status: None,
            payment_status: Some("completed".to_string()),
            appointment_date: None,
            appointment_time: None,
        };
        let bytes = event_to_bytes(&event);
        let text = std::str::from_utf8(&bytes).expect("utf8");
        assert!(text.starts_with("event: payment_verified\ndata: {"));
        assert!(text.contains("\"payment_id\":\"p1\""));
        assert!(text.ends_with("\n\n"));
    }
}
