// EsoxSolutions.ResourcePool
// Lifecycle coordinator for groups of closable resources

use async_trait::async_trait;
use esox_resourcepool::{
    Lifecycle, ListOptions, Pool, PoolConfiguration, PoolResult, Query, Resource, Value,
};
use tracing_subscriber::EnvFilter;

/// In-memory stand-in for a named file handle
struct Document {
    name: String,
    lifecycle: Lifecycle,
}

impl Document {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lifecycle: Lifecycle::new(),
        }
    }
}

#[async_trait]
impl Resource for Document {
    async fn open(&self) -> PoolResult<()> {
        self.lifecycle.open(|| async { Ok(()) }).await
    }

    async fn close(&self, allow_active: bool) -> PoolResult<()> {
        self.lifecycle.close(allow_active, || async { Ok(()) }).await
    }

    fn actives(&self) -> usize {
        self.lifecycle.actives()
    }

    fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    fn is_closing(&self) -> bool {
        self.lifecycle.is_closing()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        (name == "filename").then(|| self.name.as_str().into())
    }
}

fn filenames(pool: &Pool, pattern: &str) -> PoolResult<Vec<String>> {
    let query = Query::new().with("filename", pattern);
    Ok(pool
        .query(&query, ListOptions::default())?
        .iter()
        .filter_map(|resource| resource.attribute("filename"))
        .map(|name| name.to_string())
        .collect())
}

#[tokio::main]
async fn main() -> PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== EsoxSolutions.ResourcePool ===");

    let files = Pool::new(PoolConfiguration::default());
    let js = files.add(Pool::with_factory(
        |name: &'static str| Document::new(name),
        PoolConfiguration::default(),
    ))?;
    let json = files.add(Pool::with_factory(
        |name: &'static str| Document::new(name),
        PoolConfiguration::default(),
    ))?;

    json.resource("package-lock.json")?;
    json.resource("package.json")?;
    js.resource("test.js")?;
    js.resource("index.js")?;
    js.resource("example.js")?;

    files.ready().await?;
    println!("  Tracked (nested pools included): {}", files.size());
    println!("  *.js:   {:?}", filenames(&files, "*.js")?);
    println!("  *.json: {:?}", filenames(&files, "*.json")?);

    files.close(None).await?;
    println!("  Tracked after close: {}", files.size());

    Ok(())
}
