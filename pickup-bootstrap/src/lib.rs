pub mod context;
pub mod lifecycle;
pub mod logging;

pub use lifecycle::{run_once, run_watch};

pub async fn run(config: pickup_infrastructure::AppConfig, watch: bool) -> anyhow::Result<()> {
    let context = context::AppContext::new(config)?;
    if watch {
        run_watch(context.state).await
    } else {
        run_once(&context.state).await.map(|_| ())
    }
}
