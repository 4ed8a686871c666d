use dream::{logging, Config, MockDream, MockDreamClientRunner};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = Config::from_env()?;
    let _guard = logging::init(&config.log_dir);

    info!(?config, "Starting reference run");

    let mock_dream = MockDream::start(config.clone()).await?;
    let runner = MockDreamClientRunner::new(config);

    let outcome = tokio::select! {
        outcome = runner.execute_nominal_run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            mock_dream.close().await;
            return Ok(());
        }
    };

    mock_dream.close().await;
    match outcome {
        Ok(collected) => {
            info!(collected, "Nominal run finished");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Nominal run failed");
            Err(e.into())
        }
    }
}
