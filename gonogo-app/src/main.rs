mod app;
mod keyboard;

pub use app::App;
use app::{usage, Options};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = Options::parse(std::env::args().skip(1))?;
    if options.help {
        print!("{}", usage());
        return Ok(());
    }

    let app = App::new(options)?;
    app.run()?;

    Ok(())
}
