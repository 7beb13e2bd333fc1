use facet::Facet;
use figue as args;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use weft::{DiagnosticSink, HandlerError, MutationRelay};

mod page;
mod ui;

type AnyResult<T> = Result<T, String>;

#[derive(Facet, Debug)]
struct Cli {
    #[facet(flatten)]
    builtins: args::FigueBuiltins,
    /// Do not print the wire messages an inspector would receive.
    #[facet(args::named, default)]
    no_relay: bool,
    /// How many times to build and tear down the page.
    #[facet(args::named, default)]
    rebuilds: Option<u32>,
}

/// Forwards encoded messages to the printer task.
struct ChannelSink(mpsc::UnboundedSender<String>);

impl DiagnosticSink for ChannelSink {
    fn send(&self, message: String) -> Result<(), HandlerError> {
        Ok(self.0.send(message)?)
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> AnyResult<()> {
    let cli = parse_cli()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if !weft::is_enabled() {
        println!(
            "weft diagnostics are off for this process. Re-run with \x1b[32mWEFT_SOURCE_INFO=1\x1b[0m or under a debugger."
        );
        return Ok(());
    }

    let relay = if cli.no_relay {
        None
    } else {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                println!("inspector <- {message}");
            }
        });
        let id = weft::subscribe_handler(Arc::new(MutationRelay::new(ChannelSink(tx))));
        Some((id, printer))
    };

    for round in 0..cli.rebuilds.unwrap_or(1).max(1) {
        let page = page::MainPage::build().map_err(|e| e.to_string())?;
        for (element, location) in page.source_report() {
            match location {
                Some(location) => info!(round, %element, %location, "created"),
                None => info!(round, %element, "no source info"),
            }
        }
        page.simplify().map_err(|e| e.to_string())?;
    }

    if let Some((id, printer)) = relay {
        // Dropping the relay closes the channel, which ends the printer.
        weft::unsubscribe(id);
        printer
            .await
            .map_err(|e| format!("relay printer failed: {e}"))?;
    }

    Ok(())
}

fn parse_cli() -> AnyResult<Cli> {
    let figue_config = args::builder::<Cli>()
        .map_err(|e| format!("failed to build CLI schema: {e}"))?
        .cli(|cli| cli.strict())
        .help(|h| {
            h.program_name("weft-examples")
                .description("Build a small element tree and show what weft records about it")
                .version(option_env!("CARGO_PKG_VERSION").unwrap_or("dev"))
        })
        .build();

    args::Driver::new(figue_config)
        .run()
        .into_result()
        .map(|v| v.value)
        .map_err(|e| e.to_string())
}
