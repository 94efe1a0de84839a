use clap::Parser;

fn main() {
    lyricsdlctl::init_tracing();
    let cli = lyricsdlctl::Cli::parse();
    if let Err(err) = lyricsdlctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
