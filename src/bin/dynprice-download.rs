//! Download the Olist e-commerce dataset into `data/brazilian-ecommerce/`.

use dynprice::acquire::{AcquireOptions, DEFAULT_DATASET, download_and_move_dataset};
use dynprice::logging;

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
    let options = AcquireOptions::discover().map_err(|err| err.to_string())?;
    let path = download_and_move_dataset(DEFAULT_DATASET, &options)
        .map_err(|err| format!("{err}: {}", err.cause))?;
    println!("Dataset available at: {}", path.display());
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
        "dynprice-download",
        "",
        "Downloads olistbr/brazilian-ecommerce from Kaggle into data/brazilian-ecommerce/.",
        "Does nothing if that directory already exists.",
        "",
        "Usage:",
        "  dynprice-download",
        "",
        "Credentials are read from KAGGLE_USERNAME/KAGGLE_KEY or ~/.kaggle/kaggle.json.",
    ]
    .join("\n")
}
