use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use qurl::application::services::Client;
use qurl::domain::errors::ClientError;
use qurl::infrastructure::config;
use qurl::infrastructure::http_client::HyperHttpClient;
use qurl::presentation::cli::Cli;

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = err.print();
            return;
        }
        Err(err) => {
            let _ = err.print();
            std::process::exit(4);
        }
    };

    let config = config::load();
    let transport = match HyperHttpClient::with_options(cli.insecure) {
        Ok(transport) => transport,
        Err(err) => {
            eprintln!("{}", format!("{err:#}").red());
            std::process::exit(1);
        }
    };
    let client = Client::new(Box::new(transport), config);

    if let Err(err) = cli.run(&client).await {
        eprintln!("{}", format!("{err:#}").red());
        let code = err
            .downcast_ref::<ClientError>()
            .map_or(1, ClientError::exit_code);
        std::process::exit(code);
    }
}
