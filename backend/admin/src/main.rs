use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Base URL of the fact server.
    #[arg(long, default_value = "http://localhost:1111")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish a new fact, which becomes the current one.
    Publish { content: String },

    /// Show the current fact and its tallies.
    Current,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = admin::Client::new(&args.server);

    let fact = match args.command {
        Command::Publish { content } => client.publish(&content).await?,
        Command::Current => client.current().await?,
    };

    println!("{}", admin::describe(&fact));

    Ok(())
}
