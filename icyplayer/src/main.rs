use icyplayer::{PlayerArgs, PlayerEngine, USAGE};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout peut transporter l'audio : tout le reste part sur stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match PlayerArgs::parse(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("player: {e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    if let Err(e) = PlayerEngine::new(args).run().await {
        eprintln!("player: {e}");
        std::process::exit(1);
    }
}
