use crate::state_store::{Snapshot, StateStore};
use axum::{extract::State, http::header, response::IntoResponse, routing::get, Router};
use std::fmt::Write;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Renders the snapshot in Prometheus text exposition format.
///
/// Reports that have not been received yet, and fields a report left out, contribute
/// no lines; stale reports are served as they are.
pub fn render_metrics(snapshot: &Snapshot) -> String {
    let mut body = String::new();
    push_metric(
        &mut body,
        "keba_p30_power_output_in_percent_of_maximum",
        snapshot.device.output_percent,
    );

    if let Some(report) = &snapshot.last_report2 {
        push_metric(&mut body, "keba_p30_report2_state", report.state.code());
        push_metric(&mut body, "keba_p30_report2_plug", report.plug.code());
        push_metric(&mut body, "keba_p30_report2_curr_hw", report.max_current_hw);
        push_optional(&mut body, "keba_p30_report2_curr_user", report.max_current_user);
    }

    if let Some(report) = &snapshot.last_report3 {
        push_optional(&mut body, "keba_p30_report3_u1", report.u1);
        push_optional(&mut body, "keba_p30_report3_u2", report.u2);
        push_optional(&mut body, "keba_p30_report3_u3", report.u3);
        push_metric(&mut body, "keba_p30_report3_i1", report.i1);
        push_metric(&mut body, "keba_p30_report3_i2", report.i2);
        push_metric(&mut body, "keba_p30_report3_i3", report.i3);
        push_optional(&mut body, "keba_p30_report3_p", report.power);
        push_optional(&mut body, "keba_p30_report3_e_pres", report.energy_present);
    }

    body
}

fn push_metric(body: &mut String, name: &str, value: impl std::fmt::Display) {
    // Writing into a String cannot fail
    let _ = writeln!(body, "{name} {value}");
}

fn push_optional(body: &mut String, name: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        push_metric(body, name, value);
    }
}

/// Router answering every path with the current metrics.
pub fn router(store: StateStore) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(metrics_handler)
        .with_state(store)
}

async fn metrics_handler(State(store): State<StateStore>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain")],
        render_metrics(&store.snapshot()),
    )
}

/// Serves the metrics endpoint until the listener fails.
pub async fn serve(address: SocketAddr, store: StateStore) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address).await?;
    info!(
        "Prometheus exposure server listening on {}",
        listener.local_addr()?
    );
    axum::serve(listener, router(store)).await?;
    Ok(())
}
