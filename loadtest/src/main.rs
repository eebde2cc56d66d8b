use goose::prelude::*;
use rand::Rng;

/// Load testing suite for the ManifestKit manifest service.
///
/// Simulates the traffic a IIIF viewer fleet produces:
/// - First visits fetching manifests in either version (full record API round trip)
/// - Revalidations replaying the ETag as `If-None-Match` (expected 304)
/// - Health monitoring endpoints
///
/// # Usage
/// ```bash
/// cd loadtest
/// WSKEY=api2demo cargo run --release -- --host http://localhost:8080 --users 10 --hatch-rate 2 --run-time 60s
/// ```
///
/// The record ids in `RECORDS` must exist in the record API the server fronts.

const RECORDS: [&str; 4] = [
    "/9200397/BibliographicResource_3000126284212",
    "/92062/BibliographicResource_1000126189360",
    "/2021672/resource_document_mauritshuis_670",
    "/90402/SK_A_2344",
];

const V3_ACCEPT: &str = "application/ld+json;profile=\"http://iiif.io/api/presentation/3/context.json\"";

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("ManifestFetch")
                .register_transaction(transaction!(fetch_manifest).set_weight(10)?)
                .register_transaction(transaction!(health_check).set_weight(1)?)
        )
        .register_scenario(
            scenario!("Revalidation")
                // Replayed validators should mostly end in 304
                .register_transaction(transaction!(revalidate_manifest).set_weight(15)?)
        )
        .execute()
        .await?;

    Ok(())
}

fn wskey() -> String {
    std::env::var("WSKEY").unwrap_or_else(|_| "api2demo".into())
}

/// Manifest path for a random record, with a random `format` override.
fn random_manifest_path() -> String {
    let mut rng = rand::thread_rng();
    let record = RECORDS[rng.gen_range(0..RECORDS.len())];
    let format = if rng.gen_bool(0.5) { "2" } else { "3" };
    format!("/presentation{}/manifest?wskey={}&format={}", record, wskey(), format)
}

/// Fetches a full manifest without validators.
async fn fetch_manifest(user: &mut GooseUser) -> TransactionResult {
    // Build the path before await to satisfy Send bounds
    let path = random_manifest_path();
    let _goose = user.get(&path).await?;
    Ok(())
}

/// Fetches a v3 manifest, then replays its ETag as `If-None-Match`.
async fn revalidate_manifest(user: &mut GooseUser) -> TransactionResult {
    let path = {
        let mut rng = rand::thread_rng();
        let record = RECORDS[rng.gen_range(0..RECORDS.len())];
        format!("/presentation{}/manifest?wskey={}", record, wskey())
    };

    let request_builder = user
        .get_request_builder(&GooseMethod::Get, &path)?
        .header("Accept", V3_ACCEPT);
    let first = user
        .request(GooseRequest::builder().set_request_builder(request_builder).build())
        .await?;

    let etag = match &first.response {
        Ok(resp) => resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        Err(_) => None,
    };

    if let Some(etag) = etag {
        let request_builder = user
            .get_request_builder(&GooseMethod::Get, &path)?
            .header("Accept", V3_ACCEPT)
            .header("If-None-Match", etag);
        let _revalidated = user
            .request(
                GooseRequest::builder()
                    .set_request_builder(request_builder)
                    .expect_status_code(304)
                    .build(),
            )
            .await?;
    }

    Ok(())
}

/// Monitors service availability via health check endpoint.
async fn health_check(user: &mut GooseUser) -> TransactionResult {
    let goose = user.get("/health").await?;
    if let Ok(resp) = goose.response {
        if let Ok(text) = resp.text().await {
            let healthy = serde_json::from_str::<serde_json::Value>(&text)
                .map(|v| v["status"] == "healthy")
                .unwrap_or(false);
            if !healthy {
                eprintln!("health check reported: {}", text);
            }
        }
    }
    Ok(())
}
