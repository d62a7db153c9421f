//! first, update the variable named target with a valid url to scan
//!
//! then run the example with the following command
//! RUST_LOG="hyper=info,fuffa=debug" cargo run --example wordlist-fuzz
use fuffa::prelude::*;

use tracing::subscriber::set_global_default;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // fuffa emits structured events through the tracing library; nothing is shown
    // unless a subscriber is installed, which is the application's job
    let filter = EnvFilter::from_default_env();

    let subscriber = tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .finish();

    set_global_default(subscriber)?;

    let target = "http://localhost:8000/FUZZ";

    // every entry is also tried with each of these extensions
    let config = Config {
        extensions: vec![String::from("php"), String::from(".bak")],
        debug_first_request: true,
        ..Config::default()
    };

    let mut words = Wordlist::new("FUZZ", "./demos/words", &config)?;

    let client = AsyncClient::new(config)?;

    let mut base = Request::new("GET", target);
    base.add_header("accept", "*/*");

    while words.has_next() {
        let Some(payload) = words.payload() else {
            break;
        };

        words.increment_position();

        let input: InputMap = [payload.into_entry()].into_iter().collect();

        let mut request = client.prepare(&base, &input);
        request.set_position(words.position() - 1);

        match client.execute(&mut request).await {
            Ok(response) if response.status_code() != 404 => {
                info!(
                    url = request.url(),
                    status = response.status_code(),
                    length = response.content_length(),
                    words = response.content_words(),
                    lines = response.content_lines(),
                    duration = ?response.duration(),
                    "found"
                );
            }
            Ok(_) => {}
            Err(error) => warn!(%error, url = request.url(), "request failed"),
        }
    }

    Ok(())
}
