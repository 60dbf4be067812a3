use clap::Parser;
use std::{error::Error, io};

use tundra::{
    Command, CommandError, Config, Connection, TransportConfig, TransportKind,
    cli::{execute, prompt, render},
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Named connection from the configuration file
    #[arg(short, long, conflicts_with_all = ["host", "port"])]
    connection: Option<String>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    database: Option<String>,

    /// `http` or `websocket`
    #[arg(short, long, value_parser = parse_transport)]
    transport: Option<TransportKind>,
}

fn parse_transport(s: &str) -> Result<TransportKind, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown transport '{s}'"))
}

impl Cli {
    fn settings(self, config: &Config) -> Result<TransportConfig, Box<dyn Error>> {
        if let Some(name) = &self.connection {
            return Ok(config.connection(name)?);
        }

        let mut settings = TransportConfig {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password,
            namespace: self.namespace,
            database: self.database,
            transport: self.transport,
            ..Default::default()
        };
        settings.transport.get_or_insert(config.default_client);
        settings.apply_defaults(config.warnings);
        Ok(settings)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let mut connection = Connection::connect(&cli.settings(&config)?)?;

    let mut stdio = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    while let Some(line) = prompt(&mut stdio, &mut stdout)? {
        let command = match Command::try_from(line.as_str()) {
            Ok(c) => c,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                eprintln!("error: {e}");
                continue;
            }
        };
        let exit = command == Command::Exit;

        match execute(&mut connection, command) {
            Ok(Some(value)) => println!("{}", render(&value)),
            Ok(None) => {}
            Err(e) => eprintln!("error: {e}"),
        }
        if exit {
            return Ok(());
        }
    }

    connection.close()?;
    Ok(())
}
