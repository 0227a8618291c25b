use utoipa::OpenApi;
use voice_relay_api::router::ApiDoc;

/// Generates the OpenAPI document for the relay's HTTP surface.
fn write_openapi(
    api_doc: utoipa::openapi::OpenApi,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = api_doc.to_pretty_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    write_openapi(ApiDoc::openapi(), "openapi.json")?;
    Ok(())
}
