//! Batch training job: fit the pricing model on the order-items dataset and write the
//! model artifact.

use dynprice::config::Settings;
use dynprice::logging;
use dynprice::training::{TrainingConfig, run_training_pipeline};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    parse_args(std::env::args().skip(1).collect())?;
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    let settings = Settings::load_or_default().map_err(|err| err.to_string())?;
    let config = TrainingConfig::from_settings(&settings).map_err(|err| err.to_string())?;
    let report = run_training_pipeline(&config).map_err(|err| {
        tracing::error!("Training pipeline failed: {err}");
        err.to_string()
    })?;
    println!("MSE: {}", report.metrics.mse);
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<(), String> {
    match args.first().map(String::as_str) {
        None => Ok(()),
        Some("-h" | "--help") => Err(help_text()),
        Some(unknown) => Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
    }
}

fn help_text() -> String {
    [
        "dynprice-train",
        "",
        "Trains the dynamic-pricing model and writes it to models/model.json.",
        "",
        "Usage:",
        "  dynprice-train",
        "",
        "Paths and hyperparameter overrides come from dynprice.toml in the project root",
        "(DYNPRICE_HOME, or the current directory). Prints the held-out MSE on success.",
    ]
    .join("\n")
}
