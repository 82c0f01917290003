//! Audit console: prints the module registry, or one module's table as text.
//!
//! Run from repo root: `cargo run -p audit-console -- problems`

use audit_crud_sdk::{
    builtin_registry, load_from_path, resolve, ClientSettings, CrudManager, DataClient, ModuleRegistry, PageView,
    SessionContext, TableView,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("audit_crud_sdk=info")),
        )
        .init();

    let registry = Arc::new(load_registry().await?);
    let Some(module) = std::env::args().nth(1) else {
        print_registry(&registry);
        return Ok(());
    };

    let token = std::env::var("AUDIT_API_TOKEN").unwrap_or_default();
    let role = std::env::var("AUDIT_ROLE").unwrap_or_else(|_| "viewer".into());
    let session = SessionContext::new();
    session.login(token, role);

    let settings = ClientSettings::from_env();
    tracing::info!(base_url = %settings.base_url, module = %module, "listing module");
    let client = DataClient::new(settings, session);
    let manager = CrudManager::new(registry, &module, client);
    match manager.mount().await {
        PageView::Ready(table) => print_table(&table),
        PageView::ConfigurationMissing { module } => eprintln!("No configuration for module '{}'", module),
        PageView::AccessDenied { module } => eprintln!("Access denied to {}", module),
        PageView::NotAuthenticated => eprintln!("Not signed in: set AUDIT_API_TOKEN and AUDIT_ROLE"),
        PageView::Loading => eprintln!("Still loading"),
        PageView::Failed { message, retryable } => {
            eprintln!("{}", message);
            if retryable {
                eprintln!("Run again to retry.");
            }
        }
    }
    Ok(())
}

async fn load_registry() -> Result<ModuleRegistry, Box<dyn std::error::Error>> {
    match std::env::var("AUDIT_MODULES_PATH") {
        Ok(path) => {
            let config = load_from_path(&path).await?;
            Ok(resolve(&config)?)
        }
        Err(_) => Ok(builtin_registry()?),
    }
}

fn print_registry(registry: &ModuleRegistry) {
    println!("{} modules", registry.len());
    for schema in &registry.modules {
        println!(
            "  {:<16} /{:<18} {} fields, {} filters",
            schema.name,
            schema.endpoint,
            schema.fields.len(),
            schema.filters.len()
        );
    }
}

fn print_table(table: &TableView) {
    println!("{} ({})", table.title, table.count);
    let headers: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| !c.actions)
        .map(|c| c.header.as_str())
        .collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.cells.iter().map(|c| c.to_string()).collect())
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("{}", line(headers.clone()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"));
    for row in &rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
    if let Some(message) = &table.empty_message {
        println!("{}", message);
    }
}
