//! Inference service: load the trained model and serve `POST /predict`.

use dynprice::config::Settings;
use dynprice::logging;
use dynprice::service::{self, AppContext};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let settings = Settings::load_or_default().map_err(|err| err.to_string())?;
    let addr = settings.server.socket_addr().map_err(|err| err.to_string())?;
    let model_path = settings.model_path().map_err(|err| err.to_string())?;
    let ctx = AppContext::load(&model_path).map_err(|err| {
        tracing::error!("Startup failed: {err}");
        err.to_string()
    })?;
    service::serve(addr, ctx).await.map_err(|err| {
        tracing::error!("{err}");
        err.to_string()
    })
}
