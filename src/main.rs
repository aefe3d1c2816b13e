//!
//! relay-acl operator binary
//! -------------------------
//! Connects to the ACL database, installs the relations if missing, and either runs
//! one management call as the configured owner or reports health and relay info.
//!
//!   relay-acl                               status report
//!   relay-acl call banpubkey '["<hex>", "spam"]'
//!   relay-acl call listbannedpubkeys

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sqlx::postgres::PgPool;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use relay_acl::config::Config;
use relay_acl::management::{rpc_body, ManagementApi, SUPPORTED_METHODS};
use relay_acl::AclStore;

fn parse_call_args(args: &[String]) -> Result<Option<(String, Value)>> {
    match args.first().map(String::as_str) {
        None => Ok(None),
        Some("call") => {
            let Some(method) = args.get(1) else { bail!("usage: relay-acl call <method> [json-params]") };
            let params = match args.get(2) {
                Some(raw) => serde_json::from_str(raw).with_context(|| format!("params for {} are not valid JSON", method))?,
                None => Value::Array(Vec::new()),
            };
            Ok(Some((method.to_lowercase(), params)))
        }
        Some(other) => bail!("unknown command '{}'; expected 'call <method> [json-params]'", other),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let call = parse_call_args(&args)?;

    let cfg = Config::from_env();
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "relay_acl",
        "relay-acl {} starting: RUST_LOG='{}', owner={}, pool={}..{}",
        env!("CARGO_PKG_VERSION"),
        rust_log,
        cfg.owner_pubkey.as_deref().unwrap_or("<none>"),
        cfg.min_connections,
        cfg.max_connections
    );

    let pool: PgPool = cfg
        .pool_options()
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to the ACL database")?;
    let store = AclStore::new(pool.clone()).await.context("failed to install ACL relations")?;
    store.health().await.context("ACL database health check failed")?;

    let relay_info = store
        .load_relay_info(cfg.default_relay_info())
        .await
        .context("failed to load relay info")?;
    let api = ManagementApi::new(store.clone(), cfg.owner_pubkey.clone(), relay_info);

    match call {
        Some((method, params)) => {
            let Some(owner) = cfg.owner_pubkey.as_deref() else {
                bail!("RELAY_PUBKEY must be set to run management calls");
            };
            let outcome = api.handle(owner, &method, &params).await;
            println!("{}", serde_json::to_string_pretty(&rpc_body(&outcome))?);
            store.close();
            pool.close().await;
            outcome.map(|_| ()).with_context(|| format!("{} failed", method))
        }
        None => {
            let info = api.relay_info();
            println!("status: ok");
            println!("relay: {} ({})", info.name, info.description);
            if !info.icon.is_empty() { println!("icon: {}", info.icon); }
            println!("owner: {}", info.pubkey.as_deref().unwrap_or("<none>"));
            println!("methods: {}", SUPPORTED_METHODS.join(", "));
            store.close();
            pool.close().await;
            Ok(())
        }
    }
}
